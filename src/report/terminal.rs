use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::models::Label;
use crate::report::Verdict;

/// Render a colored terminal report.
pub fn render(verdicts: &[Verdict], quiet: bool) -> Result<()> {
    let total = verdicts.len();
    let genuine = verdicts.iter().filter(|v| v.label == Label::Genuine).count();
    let false_positives = total - genuine;

    if quiet {
        println!(
            "Total: {}  Genuine: {}  False positive: {}",
            total,
            genuine.to_string().green(),
            false_positives.to_string().red(),
        );
        return Ok(());
    }

    println!(
        "\n {} v{}\n",
        "safaa".bold(),
        env!("CARGO_PKG_VERSION")
    );

    let show_decluttered = verdicts.iter().any(|v| v.decluttered.is_some());
    println!("{}", build_table(verdicts, show_decluttered));

    println!(
        "\n {} {} genuine, {} {} false positive\n",
        "✓".green(),
        genuine,
        "✗".red(),
        false_positives
    );

    Ok(())
}

fn build_table(verdicts: &[Verdict], show_decluttered: bool) -> Table {
    let mut header = vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Text").add_attribute(Attribute::Bold),
        Cell::new("Label").add_attribute(Attribute::Bold),
    ];
    if show_decluttered {
        header.push(Cell::new("Decluttered").add_attribute(Attribute::Bold));
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for (i, verdict) in verdicts.iter().enumerate() {
        let (label_str, label_color) = match verdict.label {
            Label::Genuine => ("✓ t", Color::Green),
            Label::FalsePositive => ("✗ f", Color::Red),
        };

        let mut row = vec![
            Cell::new(i + 1),
            Cell::new(&verdict.text),
            Cell::new(label_str)
                .fg(label_color)
                .set_alignment(CellAlignment::Center),
        ];
        if show_decluttered {
            row.push(Cell::new(verdict.decluttered.as_deref().unwrap_or("")));
        }
        table.add_row(row);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_decluttered_column_only_when_requested() {
        let verdicts = vec![Verdict {
            text: "© 2020 Acme".to_string(),
            label: Label::Genuine,
            decluttered: Some("Acme".to_string()),
        }];
        let with = build_table(&verdicts, true).to_string();
        assert!(with.contains("Decluttered"));
        let without = build_table(&verdicts, false).to_string();
        assert!(!without.contains("Decluttered"));
        assert!(without.contains("© 2020 Acme"));
    }
}
