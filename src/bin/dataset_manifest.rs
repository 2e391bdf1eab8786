use edudash::config::DashboardConfig;
use edudash::data::{analyze_dataset, default_manifest_path, TableName};
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    // Same lookup as the dashboard: argument, then EDUDASH_DATA_DIR, then the default.
    let dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| DashboardConfig::from_env().data_dir);

    let manifest = analyze_dataset(&dir);
    for file in &manifest.files {
        let status = if !file.present {
            "missing"
        } else if file.schema.as_ref().map(|s| s.ok).unwrap_or(false) {
            "ok"
        } else {
            "bad schema"
        };
        println!("{:<32} {:<10} rows={}", file.table.file_name(), status, file.row_count);
        for w in &file.warnings {
            println!("    {}", w);
        }
    }

    let payload = match serde_json::to_string_pretty(&manifest) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("failed to serialize manifest: {}", err);
            std::process::exit(3);
        }
    };
    let out_path = default_manifest_path(&dir);
    if let Err(err) = fs::write(&out_path, payload) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(4);
    }
    println!("wrote manifest {}", out_path.display());

    if !manifest.complete {
        eprintln!("dataset incomplete; expected files: {:?}", TableName::ALL.map(|t| t.file_name()));
        std::process::exit(2);
    }
}
