//! Builtin shell commands (design doc §4.5, Shell Executor).
//!
//! Each builtin is a small async function over the VFS facade and a pair of
//! output sinks, resolved by name from [`resolve`]. Kept deliberately small:
//! builtins exist to make the shell usable for basic file work, not to be a
//! coreutils clone.

use std::sync::Arc;

use vessel_shared::errors::{FsErrorCode, VesselError, VesselResult};

use crate::vfs::VfsFacade;

pub struct BuiltinCtx {
    pub vfs: Arc<VfsFacade>,
    pub cwd: String,
}

impl BuiltinCtx {
    fn resolve(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{path}", self.cwd.trim_end_matches('/'))
        }
    }
}

pub type BuiltinFn = fn(&BuiltinCtx, &[String]) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send + '_>>;

#[derive(Default)]
pub struct BuiltinOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl BuiltinOutput {
    fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self { stdout: stdout.into(), stderr: Vec::new(), exit_code: 0 }
    }

    fn err(stderr: impl Into<Vec<u8>>, code: i32) -> Self {
        Self { stdout: Vec::new(), stderr: stderr.into(), exit_code: code }
    }
}

/// Returns the builtin implementation for `name`, or `None` if it isn't one
/// (the shell executor then falls through to the script executor).
pub fn resolve(name: &str) -> Option<BuiltinFn> {
    match name {
        "echo" => Some(echo),
        "pwd" => Some(pwd),
        "cat" => Some(cat),
        "ls" => Some(ls),
        "mkdir" => Some(mkdir),
        "rm" => Some(rm),
        "mv" => Some(mv),
        "grep" => Some(grep),
        _ => None,
    }
}

fn echo<'a>(_ctx: &'a BuiltinCtx, args: &'a [String]) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send + 'a>> {
    Box::pin(async move {
        let mut line = args.join(" ");
        line.push('\n');
        Ok(BuiltinOutput::ok(line.into_bytes()))
    })
}

fn pwd<'a>(ctx: &'a BuiltinCtx, _args: &'a [String]) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send + 'a>> {
    Box::pin(async move {
        let mut line = ctx.cwd.clone();
        line.push('\n');
        Ok(BuiltinOutput::ok(line.into_bytes()))
    })
}

fn cat<'a>(ctx: &'a BuiltinCtx, args: &'a [String]) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send + 'a>> {
    Box::pin(async move {
        if args.is_empty() {
            return Ok(BuiltinOutput::err("cat: missing operand\n", 1));
        }
        let mut out = Vec::new();
        for arg in args {
            match ctx.vfs.read_file(&ctx.resolve(arg)).await {
                Ok(content) => out.extend(content),
                Err(e) => return Ok(BuiltinOutput::err(format!("cat: {arg}: {e}\n"), 1)),
            }
        }
        Ok(BuiltinOutput::ok(out))
    })
}

fn ls<'a>(ctx: &'a BuiltinCtx, args: &'a [String]) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send + 'a>> {
    Box::pin(async move {
        let target = args.first().map(|s| ctx.resolve(s)).unwrap_or_else(|| ctx.cwd.clone());
        match ctx.vfs.readdir(&target).await {
            Ok(entries) => {
                let mut names: Vec<&str> = entries
                    .iter()
                    .map(|m| m.path.rsplit('/').next().unwrap_or(&m.path))
                    .collect();
                names.sort_unstable();
                let mut out = names.join("\n");
                out.push('\n');
                Ok(BuiltinOutput::ok(out.into_bytes()))
            }
            Err(e) => Ok(BuiltinOutput::err(format!("ls: {target}: {e}\n"), 1)),
        }
    })
}

fn mkdir<'a>(ctx: &'a BuiltinCtx, args: &'a [String]) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send + 'a>> {
    Box::pin(async move {
        let recursive = args.iter().any(|a| a == "-p");
        let targets: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
        if targets.is_empty() {
            return Ok(BuiltinOutput::err("mkdir: missing operand\n", 1));
        }
        for arg in targets {
            if let Err(e) = ctx.vfs.mkdir(&ctx.resolve(arg), recursive).await {
                return Ok(BuiltinOutput::err(format!("mkdir: {arg}: {e}\n"), 1));
            }
        }
        Ok(BuiltinOutput::ok(Vec::new()))
    })
}

fn rm<'a>(ctx: &'a BuiltinCtx, args: &'a [String]) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send + 'a>> {
    Box::pin(async move {
        let recursive = args.iter().any(|a| a == "-r" || a == "-rf" || a == "-fr");
        for arg in args.iter().filter(|a| !a.starts_with('-')) {
            let path = ctx.resolve(arg);
            let result = if recursive {
                remove_recursive(&ctx.vfs, &path).await
            } else {
                ctx.vfs.unlink(&path).await
            };
            if let Err(e) = result {
                return Ok(BuiltinOutput::err(format!("rm: {arg}: {e}\n"), 1));
            }
        }
        Ok(BuiltinOutput::ok(Vec::new()))
    })
}

async fn remove_recursive(vfs: &VfsFacade, path: &str) -> VesselResult<()> {
    match vfs.stat(path).await {
        Ok(meta) if meta.is_dir() => vfs.rmdir(path, true).await,
        Ok(_) => vfs.unlink(path).await,
        Err(e) if matches!(&e, VesselError::Fs { code: FsErrorCode::ENOENT, .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

fn mv<'a>(ctx: &'a BuiltinCtx, args: &'a [String]) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send + 'a>> {
    Box::pin(async move {
        if args.len() != 2 {
            return Ok(BuiltinOutput::err("mv: usage: mv <src> <dst>\n", 1));
        }
        let (from, to) = (ctx.resolve(&args[0]), ctx.resolve(&args[1]));
        match ctx.vfs.rename(&from, &to).await {
            Ok(()) => Ok(BuiltinOutput::ok(Vec::new())),
            Err(e) => Ok(BuiltinOutput::err(format!("mv: {e}\n"), 1)),
        }
    })
}

fn grep<'a>(ctx: &'a BuiltinCtx, args: &'a [String]) -> std::pin::Pin<Box<dyn std::future::Future<Output = VesselResult<BuiltinOutput>> + Send + 'a>> {
    Box::pin(async move {
        let Some((pattern, files)) = args.split_first() else {
            return Ok(BuiltinOutput::err("grep: usage: grep <pattern> [file...]\n", 1));
        };
        let mut out = Vec::new();
        let mut any = false;
        for file in files {
            let path = ctx.resolve(file);
            let content = match ctx.vfs.read_file(&path).await {
                Ok(c) => c,
                Err(e) => {
                    out.extend(format!("grep: {file}: {e}\n").into_bytes());
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&content);
            for line in text.lines() {
                if line.contains(pattern.as_str()) {
                    any = true;
                    out.extend(format!("{file}:{line}\n").into_bytes());
                }
            }
        }
        Ok(BuiltinOutput { stdout: out, stderr: Vec::new(), exit_code: if any { 0 } else { 1 } })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;

    async fn ctx() -> BuiltinCtx {
        let vfs = Arc::new(VfsFacade::new(None, EventBus::new()).await.unwrap());
        BuiltinCtx { vfs, cwd: "/".to_string() }
    }

    #[tokio::test]
    async fn echo_joins_args_with_newline() {
        let ctx = ctx().await;
        let out = echo(&ctx, &["hi".into(), "there".into()]).await.unwrap();
        assert_eq!(out.stdout, b"hi there\n");
    }

    #[tokio::test]
    async fn cat_reads_written_file() {
        let ctx = ctx().await;
        ctx.vfs.write_file("/a.txt", b"hello".to_vec()).await.unwrap();
        let out = cat(&ctx, &["a.txt".into()]).await.unwrap();
        assert_eq!(out.stdout, b"hello");
    }

    #[tokio::test]
    async fn mkdir_dash_p_creates_missing_parents() {
        let ctx = ctx().await;
        let out = mkdir(&ctx, &["-p".into(), "a/b/c".into()]).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(ctx.vfs.stat("/a/b/c").await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn rm_recursive_removes_tree() {
        let ctx = ctx().await;
        ctx.vfs.mkdir("/dir", false).await.unwrap();
        ctx.vfs.write_file("/dir/a.txt", b"x".to_vec()).await.unwrap();
        let out = rm(&ctx, &["-r".into(), "dir".into()]).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(ctx.vfs.stat("/dir").await.is_err());
    }
}
