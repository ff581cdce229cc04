use docfill::{FillReport, NormalizeReport, Occurrence, Representation, SkipReason};

mod ansi {
    pub const DIM: &str = "2";
    pub const BOLD: &str = "1";
    pub const RED: &str = "31";
    pub const GREEN: &str = "32";
    pub const YELLOW: &str = "33";
    pub const BLUE: &str = "34";
    pub const CYAN: &str = "36";
    pub const GRAY: &str = "90";

    /// SGR styling that collapses to plain text when color is off.
    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, code: &str) -> String {
            match self.enabled {
                true => format!("\x1b[{code}m{}\x1b[0m", s.as_ref()),
                false => s.as_ref().to_string(),
            }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            self.paint(s, BOLD)
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            self.paint(s, DIM)
        }
    }
}

pub fn print_scan(file: &str, representation: Representation, slots: &[Occurrence], color: bool) {
    let palette = ansi::Palette::new(color);
    println!(
        "\n{}",
        palette.bold(palette.paint(format!("⚙  Scanning: \"{}\" ({})", file, representation.name()), ansi::CYAN))
    );

    println!("\n{}", palette.paint("━━━ Slots ━━━", ansi::GRAY));
    if slots.is_empty() {
        println!("{}", palette.dim("  No placeholder-like spans found"));
        println!();
        return;
    }

    for slot in slots {
        println!(
            "  {} {} {} {}",
            palette.paint(&slot.id, ansi::GRAY),
            palette.bold(palette.paint(preview(&slot.raw, 60), ansi::GREEN)),
            palette.dim("│"),
            palette.paint(format!("span {}..{}", slot.span.start, slot.span.end), ansi::YELLOW),
        );
        let mut detail = format!("{} {}", palette.dim("kind:"), palette.paint(slot.kind.name(), ansi::BLUE));
        if let Some(label) = &slot.label_guess {
            detail.push_str(&format!("  {} {}", palette.dim("│ label:"), palette.paint(label, ansi::CYAN)));
        }
        if slot.has_currency_marker {
            detail.push_str(&format!("  {}", palette.paint("$", ansi::YELLOW)));
        }
        println!("      {detail}");
    }

    println!("\n{}", palette.paint("━━━ Totals ━━━", ansi::GRAY));
    println!("  Slots: {}", palette.paint(slots.len().to_string(), ansi::GREEN));
    println!();
}

pub fn print_normalize(report: &NormalizeReport, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.paint("━━━ Descriptors ━━━", ansi::GRAY));

    for outcome in &report.outcomes {
        let status = match &outcome.skipped {
            Some(SkipReason::DuplicatePattern { kept_key }) => {
                palette.paint(format!("✗ duplicate of {kept_key}"), ansi::YELLOW)
            }
            Some(SkipReason::PatternCompile { message }) => palette.paint(format!("✗ {message}"), ansi::RED),
            None if outcome.total_replaced() == 0 => palette.dim("✗ no matches"),
            None => palette.paint(format!("✓ {} replaced", outcome.total_replaced()), ansi::GREEN),
        };
        println!(
            "  {} {} {}  {}",
            palette.bold(palette.paint(&outcome.key, ansi::CYAN)),
            palette.dim("│"),
            palette.paint(preview(&outcome.pattern, 40), ansi::BLUE),
            status
        );

        if outcome.skipped.is_none() {
            let per_rep: Vec<String> = outcome
                .replaced
                .iter()
                .map(|(rep, n)| {
                    let flexible = if outcome.flexible.contains(rep) { "~" } else { "" };
                    format!("{}: {n}{flexible}", rep.name())
                })
                .collect();
            println!("      {}", palette.dim(per_rep.join("  ")));
        }
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Skipped: {}",
        palette.paint(format!("{:?}", report.elapsed), ansi::GREEN),
        palette.dim(report.skipped().count().to_string()),
    );
    println!();
}

pub fn print_fill(report: &FillReport, written: &[String], color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.paint("━━━ Fill ━━━", ansi::GRAY));
    println!(
        "  Markers: {}  │  Spans: {}  │  Overlapping: {}  │  Stale: {}  │  Labels missing: {}",
        palette.paint(report.markers_replaced.to_string(), ansi::GREEN),
        palette.paint(report.spans_applied.to_string(), ansi::GREEN),
        palette.dim(report.spans_overlapping.to_string()),
        palette.dim(report.spans_stale.to_string()),
        palette.dim(report.labels_missing.to_string()),
    );
    for path in written {
        println!("  {} {}", palette.dim("wrote"), palette.paint(path, ansi::CYAN));
    }
    println!();
}

fn preview(s: &str, max: usize) -> String {
    let one_line = s.replace(['\n', '\r'], " ");
    if one_line.chars().count() <= max {
        one_line
    } else {
        format!("{}…", one_line.chars().take(max).collect::<String>())
    }
}
