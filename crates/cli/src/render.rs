//! Human-readable tables for the final snapshots.

use std::fmt::Write;

use necker_core::{BlameStatistics, CanonicalType, ObjectIdentity, Statistics};

pub fn statistics_table(all: &[Statistics]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<40} {:<24} {:>6} {:>6} {:>6}", "TYPE", "NAMESPACE", "ADD", "UPDATE", "DELETE");
    for stats in all {
        for (ns, counts) in &stats.namespaces {
            let ns_col = if ns.is_empty() { "-" } else { ns.as_str() };
            let _ = writeln!(
                out,
                "{:<40} {:<24} {:>6} {:>6} {:>6}",
                stats.gvk.to_string(),
                ns_col,
                counts.added,
                counts.updated,
                counts.deleted
            );
            for (name, obj) in counts.resources.iter().filter(|(_, o)| o.updated > 0) {
                let _ = writeln!(out, "  {:<63} {:>13}", name, obj.updated);
            }
        }
    }
    out
}

pub fn blame_table(target: &CanonicalType, object: &ObjectIdentity, stats: &BlameStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{target} {object} (last update {})", stats.high_water_mark.to_rfc3339());
    let _ = writeln!(out, "{:<48} {:>7}", "MANAGER", "UPDATES");
    let mut rows: Vec<_> = stats.managers.iter().collect();
    rows.sort_by(|a, b| b.1.updated.cmp(&a.1.updated).then_with(|| a.0.cmp(b.0)));
    for (manager, m) in rows {
        let name = if manager.is_empty() { "<unnamed>" } else { manager.as_str() };
        let _ = writeln!(out, "{:<48} {:>7}", name, m.updated);
    }
    out
}
