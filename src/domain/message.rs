//! Plain-text notification bodies.

use crate::domain::position::PositionSnapshot;
use crate::domain::transition::SignalTransition;

/// Short display name: first three characters of the strategy name and the
/// symbol, e.g. `zsc_BTC`.
pub fn strat_label(name: &str, symbol: &str) -> String {
    let prefix: String = name.chars().take(3).collect();
    format!("{prefix}_{symbol}")
}

/// Right-aligned table of `date  strat_name  signal_plus` rows.
pub fn transition_summary(transitions: &[SignalTransition]) -> String {
    let header = ["date", "strat_name", "signal_plus"];
    let rows: Vec<[String; 3]> = transitions
        .iter()
        .map(|t| {
            [
                t.current_timestamp.format("%y-%m-%d %H:%M").to_string(),
                strat_label(&t.key.name, &t.key.symbol),
                t.bucket().code(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 3]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{c:>w$}"))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut out = String::from("result_signal:\n\n");
    out.push_str(&line(header));
    for row in &rows {
        out.push('\n');
        out.push_str(&line([&row[0], &row[1], &row[2]]));
    }
    out
}

/// `title:` followed by one `key: value` line per field.
pub fn status_text(title: &str, fields: &[(&str, String)]) -> String {
    let body: Vec<String> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    format!("{title}:\n\n{}", body.join("\n"))
}

pub fn position_status(title: &str, position: &PositionSnapshot) -> String {
    status_text(title, &position.status_fields())
}
