//! On-disk fixtures shared by the unit tests

use std::fs;
use std::path::{Path, PathBuf};

/// Write `content` to `root/rel`, creating parent directories
pub fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// A pack rendering one Deployment with `values.replicas` (default 1)
pub fn write_pack(root: &Path, rel: &str, name: &str) -> PathBuf {
    write(
        root,
        &format!("{}/Pack.yaml", rel),
        &format!("apiVersion: rudder/v1\nmetadata:\n  name: {}\n  version: 0.1.0\n", name),
    );
    write(root, &format!("{}/values.yaml", rel), "replicas: 1\n");
    write(
        root,
        &format!("{}/templates/deployment.yaml", rel),
        "kind: Deployment\nmetadata:\n  name: {{ pack.name }}\n  namespace: {{ release.namespace }}\nspec:\n  replicas: {{ values.replicas }}\n",
    );
    root.join(rel)
}
