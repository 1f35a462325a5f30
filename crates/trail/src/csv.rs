use fairsoil_types::{TrailItem, format_iso_timestamp};

pub const CSV_HEADER: &str = "timestamp,title,body";

/// Audit export: bare header, then one quoted row per item joined by `\n`.
pub fn export_csv<'a>(items: impl IntoIterator<Item = &'a TrailItem>) -> String {
    let mut lines = vec![CSV_HEADER.to_string()];
    for item in items {
        let row = [
            format_iso_timestamp(item.timestamp),
            item.title.clone(),
            item.body.clone().unwrap_or_default(),
        ];
        lines.push(
            row.iter()
                .map(|cell| quote(cell))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

pub fn csv_file_name(now_millis: u64) -> String {
    format!("audit-trail-{now_millis}.csv")
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}
