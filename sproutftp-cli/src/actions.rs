use std::fs::File;
use std::path::Path;

use sproutftp::{remote_path, FileManager};

pub fn list(manager: &FileManager, p: Option<&str>) {
    match manager.list_directory(p) {
        Ok(entries) => {
            for entry in entries {
                let size = entry
                    .size()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| String::from("-"));
                let modified = entry
                    .modified()
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("{:<4} {:>12} {:<16} {}", entry.kind(), size, modified, entry.name());
            }
        }
        Err(err) => eprintln!("LIST error: {}", err),
    }
}

pub fn mkdir(manager: &FileManager, dir: &str) {
    match manager.create_directory(dir) {
        Ok(path) => println!("OK: {}", path),
        Err(err) => eprintln!("MKDIR error: {}", err),
    }
}

pub fn put(manager: &FileManager, local: &Path, dest: Option<&str>, overwrite: bool) {
    let mut reader = match File::open(local) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("Failed to open local file for read: {}", err);
            return;
        }
    };
    let dest = match dest {
        Some(dest) => dest.to_string(),
        None => {
            let Some(name) = local.file_name() else {
                eprintln!("Can't tell the file name of {}", local.display());
                return;
            };
            remote_path(
                &manager.config().default_path,
                &name.to_string_lossy(),
            )
        }
    };
    match manager.upload_file(&dest, &mut reader, overwrite) {
        Ok(bytes) => println!("OK: {} bytes written to {}", bytes, dest),
        Err(err) => eprintln!("PUT error: {}", err),
    }
}

pub fn retr(manager: &FileManager, file: &str, dest: &Path) {
    let mut writer = match File::create(dest) {
        Ok(w) => w,
        Err(err) => {
            eprintln!("Failed to open local file for write: {}", err);
            return;
        }
    };
    match manager.download_to(file, &mut writer) {
        Ok(bytes) => println!("OK: {} bytes written to {}", bytes, dest.display()),
        Err(err) => {
            eprintln!("RETR error: {}", err);
            drop(writer);
            if let Err(err) = std::fs::remove_file(dest) {
                eprintln!("Failed to remove {}: {}", dest.display(), err);
            }
        }
    }
}

pub fn rm(manager: &FileManager, path: &str) {
    match manager.delete_entry(path) {
        Ok(kind) => println!("OK: {} removed", kind),
        Err(err) => eprintln!("RM error: {}", err),
    }
}
