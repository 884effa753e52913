//! Config subcommand - print the effective configuration

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use gcd_core::fmt_num;
use gcd_extract::CompressionKind;

use crate::config::Config;

fn flag(on: bool) -> String {
    if on { "yes" } else { "no" }.to_string()
}

/// Setting/value rows shown by `gcd-etl config`
pub fn rows(config: &Config) -> Vec<(&'static str, String)> {
    let db = &config.database;
    let schema = &config.schema;
    let compression = match config.parquet.compression {
        CompressionKind::Snappy => "snappy".to_string(),
        CompressionKind::Zstd => format!("zstd (level {})", config.parquet.zstd_level),
    };
    vec![
        ("Database", db.describe()),
        (
            "Password",
            if db.password.is_some() { "configured" } else { "not set" }.to_string(),
        ),
        ("Publication type", flag(schema.publication_type)),
        ("Volume not printed", flag(schema.volume_not_printed)),
        ("Series is singleton", flag(schema.series_is_singleton)),
        ("Story first line", flag(schema.story_first_line)),
        ("Story credit table", flag(schema.story_credit)),
        ("Index doc buffer", fmt_num(config.index.doc_buffer_size)),
        ("Index commit interval", fmt_num(config.index.commit_interval)),
        ("Index merge factor", fmt_num(config.index.merge_factor)),
        ("Index memory budget", format!("{} bytes", fmt_num(config.index.memory_budget_bytes))),
        ("Rows per partition", fmt_num(config.parquet.rows_per_part)),
        ("Parquet compression", compression),
        ("Output directory", config.output.default_dir.display().to_string()),
        ("Archive index", flag(config.output.archive)),
        ("Log interval", fmt_num(config.progress.log_interval)),
    ]
}

pub fn run(config: &Config) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows(config) {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_never_shown() {
        let mut config = Config::default();
        config.database.password = Some("hunter2".to_string());
        let rows = rows(&config);
        assert!(rows.iter().all(|(_, v)| !v.contains("hunter2")));
        assert!(rows.contains(&("Password", "configured".to_string())));
    }

    #[test]
    fn zstd_row_shows_level() {
        let mut config = Config::default();
        config.parquet.compression = CompressionKind::Zstd;
        config.parquet.zstd_level = 9;
        assert!(rows(&config).contains(&("Parquet compression", "zstd (level 9)".to_string())));
    }
}
