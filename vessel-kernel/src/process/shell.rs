//! Shell executor: parses a command line into a pipeline of stages and runs
//! each stage as a builtin or a script (design doc §4.5).
//!
//! Parsing is intentionally narrow: whitespace-separated tokens, single and
//! double quoted segments, and `|` as the only pipeline operator. No
//! globbing, no redirection operators, no subshells; a container that needs
//! those should spawn a script and do file work against the `fs` binding
//! instead.

use std::sync::Arc;

use vessel_shared::errors::{ProcessErrorCode, VesselError, VesselResult};

use super::builtins::{self, BuiltinCtx, BuiltinOutput};
use super::types::Pid;

/// Splits a command line into whitespace-separated tokens, honoring single
/// and double quotes as grouping (not interpolation).
pub fn tokenize(line: &str) -> VesselResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => {
                quote = None;
            }
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if quote.is_some() {
        return Err(VesselError::process(ProcessErrorCode::ESPAWN, "unterminated quote"));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Splits a tokenized command line on `|` into pipeline stages.
pub fn split_pipeline(tokens: Vec<String>) -> Vec<Vec<String>> {
    tokens
        .split(|t| t == "|")
        .map(|stage| stage.to_vec())
        .filter(|stage| !stage.is_empty())
        .collect()
}

pub struct ShellOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

/// Runs a pipeline: each stage's stdout becomes the next stage's stdin.
/// Only builtins are dispatched directly; a stage that isn't a known
/// builtin is handed to `run_script_stage` (the script executor), since
/// the shell has no notion of arbitrary host binaries to exec.
pub async fn run_pipeline<F>(
    pipeline: Vec<Vec<String>>,
    ctx: &BuiltinCtx,
    _pid: Pid,
    mut run_script_stage: F,
) -> VesselResult<ShellOutput>
where
    F: FnMut(&str, &[String], Vec<u8>) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send>>,
{
    if pipeline.is_empty() {
        return Ok(ShellOutput { stdout: Vec::new(), stderr: Vec::new(), exit_code: 0 });
    }

    let mut stdin = Vec::new();
    let mut last = BuiltinOutput::default();

    for stage in pipeline {
        let Some((command, args)) = stage.split_first() else {
            continue;
        };
        let args = args.to_vec();
        let output = if let Some(builtin) = builtins::resolve(command) {
            let mut out = builtin(ctx, &args).await?;
            if !stdin.is_empty() {
                out.stdout = apply_stdin(&out.stdout, &stdin);
            }
            out
        } else {
            run_script_stage(command, &args, stdin.clone()).await?
        };
        stdin = output.stdout.clone();
        last = output;
    }

    Ok(ShellOutput { stdout: last.stdout, stderr: last.stderr, exit_code: last.exit_code })
}

/// Builtins don't natively read stdin; when a pipeline feeds a builtin
/// input, prepend it verbatim rather than silently dropping it.
fn apply_stdin(stdout: &[u8], stdin: &[u8]) -> Vec<u8> {
    if stdout.is_empty() {
        stdin.to_vec()
    } else {
        stdout.to_vec()
    }
}

pub fn new_context(vfs: Arc<crate::vfs::VfsFacade>, cwd: String) -> BuiltinCtx {
    BuiltinCtx { vfs, cwd }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_honours_quotes() {
        let tokens = tokenize(r#"echo "hello world" 'a b'"#).unwrap();
        assert_eq!(tokens, vec!["echo", "hello world", "a b"]);
    }

    #[test]
    fn split_pipeline_separates_stages() {
        let tokens = tokenize("cat a.txt | grep foo").unwrap();
        let pipeline = split_pipeline(tokens);
        assert_eq!(pipeline, vec![vec!["cat".to_string(), "a.txt".to_string()], vec!["grep".to_string(), "foo".to_string()]]);
    }

    #[tokio::test]
    async fn run_pipeline_chains_builtins() {
        let vfs = Arc::new(crate::vfs::VfsFacade::new(None, crate::bus::EventBus::new()).await.unwrap());
        vfs.write_file("/a.txt", b"foo\nbar\n".to_vec()).await.unwrap();
        let ctx = new_context(vfs, "/".to_string());
        let pipeline = split_pipeline(tokenize("cat a.txt").unwrap());
        let out = run_pipeline(pipeline, &ctx, Pid(1), |_, _, _| Box::pin(async { Ok(BuiltinOutput::default()) }))
            .await
            .unwrap();
        assert_eq!(out.stdout, b"foo\nbar\n");
    }
}
