//! Check command implementation.
//!
//! Validates configuration and the per-uid statistics source.

use uid_io_monitor::uid_stats::parse_uid_io_stats;
use uid_io_monitor::uid_names::{NameResolver, PasswdResolver};
use uid_io_monitor::{FileStatsSource, RawStatsSource};

use crate::config::{validate_effective_config, Config};

/// Validates configuration, the statistics source and uid naming.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 UID I/O Monitor - System Check");
    println!("==================================");

    let mut all_ok = true;

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Check statistics source
    let source = FileStatsSource::new(&config.monitor.stats_path);
    println!("\n📁 Checking statistics source {}...", source.describe());
    let mut sample_uids: Vec<u32> = Vec::new();
    match source.read_raw() {
        Ok(raw) => {
            let parsed = parse_uid_io_stats(&raw);
            let tasks: usize = parsed.uids.values().map(|u| u.tasks.len()).sum();
            if parsed.uids.is_empty() {
                println!("   ❌ No valid uid rows found");
                all_ok = false;
            } else {
                println!(
                    "   ✅ Parsed {} uids with {} tasks",
                    parsed.uids.len(),
                    tasks
                );
            }
            if parsed.malformed_rows > 0 {
                println!("   ⚠️  {} malformed rows skipped", parsed.malformed_rows);
            }
            if parsed.orphan_tasks > 0 {
                println!(
                    "   ⚠️  {} task rows without a preceding uid row",
                    parsed.orphan_tasks
                );
            }
            sample_uids = parsed.uids.keys().copied().collect();
            sample_uids.sort_unstable();
            sample_uids.truncate(5);
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    // Check uid naming
    println!("\n👤 Checking uid names from {}...", config.monitor.passwd_path.display());
    if sample_uids.is_empty() {
        sample_uids = vec![0];
    }
    let resolver = PasswdResolver::new(&config.monitor.passwd_path);
    match resolver.resolve(&sample_uids) {
        Ok(names) => {
            for (uid, name) in sample_uids.iter().zip(names.iter()) {
                if name.is_empty() {
                    println!("   ⚠️  uid {} has no name, will be reported by number", uid);
                } else {
                    println!("   ✅ uid {} -> {}", uid, name);
                }
            }
        }
        Err(e) => {
            println!("   ⚠️  Name lookup unavailable: {}", e);
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
