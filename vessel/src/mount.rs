//! Installs an initial `filesystem` tree at boot (design doc §6,
//! `container.mount`).

use std::future::Future;
use std::pin::Pin;

use vessel_kernel::vfs::VfsFacade;
use vessel_shared::errors::VesselResult;

use crate::options::FsNode;

/// Recursively installs `tree` under `root` into `vfs`, creating
/// directories before the files and symlinks inside them.
pub(crate) async fn install(vfs: &VfsFacade, root: &str, tree: &std::collections::BTreeMap<String, FsNode>) -> VesselResult<()> {
    for (name, node) in tree {
        let path = join(root, name);
        install_node(vfs, path, node).await?;
    }
    Ok(())
}

// `async fn` can't recurse directly (infinite-sized future), so the
// recursive call is boxed by hand.
fn install_node<'a>(vfs: &'a VfsFacade, path: String, node: &'a FsNode) -> Pin<Box<dyn Future<Output = VesselResult<()>> + Send + 'a>> {
    Box::pin(async move {
        match node {
            FsNode::Directory { entries } => {
                vfs.mkdir(&path, false).await?;
                for (name, child) in entries {
                    install_node(vfs, join(&path, name), child).await?;
                }
                Ok(())
            }
            FsNode::File { contents } => vfs.write_file(&path, contents.clone()).await,
            FsNode::Symlink { target } => {
                // The VFS has no first-class symlink node; the closest faithful
                // projection is a regular file holding the link target, which
                // keeps `readFile`/`stat` well-defined without inventing a new
                // inode kind the rest of the container doesn't understand.
                vfs.write_file(&path, target.clone().into_bytes()).await
            }
        }
    })
}

fn join(root: &str, name: &str) -> String {
    if root.ends_with('/') {
        format!("{root}{name}")
    } else {
        format!("{root}/{name}")
    }
}

/// Walks `root` back into an [`FsNode`] tree, the inverse of [`install`]
/// (design doc §6, `container.export`).
pub(crate) async fn export(vfs: &VfsFacade, root: &str) -> VesselResult<std::collections::BTreeMap<String, FsNode>> {
    let mut tree = std::collections::BTreeMap::new();
    for entry in vfs.readdir(root).await? {
        let name = entry
            .path
            .rsplit('/')
            .next()
            .unwrap_or(&entry.path)
            .to_string();
        if name.is_empty() {
            continue;
        }
        let node = if entry.is_dir() {
            FsNode::Directory { entries: export_node(vfs, &entry.path).await? }
        } else {
            FsNode::File { contents: vfs.read_file(&entry.path).await? }
        };
        tree.insert(name, node);
    }
    Ok(tree)
}

fn export_node<'a>(vfs: &'a VfsFacade, path: &'a str) -> Pin<Box<dyn Future<Output = VesselResult<std::collections::BTreeMap<String, FsNode>>> + Send + 'a>> {
    Box::pin(export(vfs, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn join_root_avoids_double_slash() {
        assert_eq!(join("/", "etc"), "/etc");
        assert_eq!(join("/srv", "app"), "/srv/app");
        assert_eq!(join("/srv/", "app"), "/srv/app");
    }

    proptest! {
        #[test]
        fn join_always_has_exactly_one_separator_between_root_and_name(
            root in "/[a-z]{0,8}",
            name in "[a-z]{1,8}",
        ) {
            let joined = join(&root, &name);
            prop_assert!(joined.starts_with(&root));
            prop_assert!(joined.ends_with(&name));
            prop_assert_eq!(joined.matches("//").count(), 0);
        }
    }
}
