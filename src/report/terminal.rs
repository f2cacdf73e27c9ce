use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use super::{status_line, Catalog};
use crate::composite::{group_points, group_rubric, grade_rating, LookupReport};
use crate::models::{CategoryShare, Classification, GradeBand, RunStats, SiteMetrics, TrackerFact};

fn header(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Green at 7 and above, yellow from 4, red below.
fn score_color(score: f64) -> Color {
    if score >= 7.0 {
        Color::Green
    } else if score >= 4.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn colored_score(score: f64) -> ColoredString {
    let text = format!("{score:.1}/10");
    if score >= 7.0 {
        text.green().bold()
    } else if score >= 4.0 {
        text.yellow().bold()
    } else {
        text.red().bold()
    }
}

fn print_banner(quiet: bool) {
    if !quiet {
        println!("\n {} v{}\n", "privacy-scope".bold(), env!("CARGO_PKG_VERSION"));
    }
}

/// Render one lookup: composite score, then each catalog's evidence.
pub fn render_lookup(report: &LookupReport, verbose: bool, quiet: bool) {
    if quiet {
        match report.composite {
            Some(c) => println!("{}: {:.1}", report.display_name.as_deref().unwrap_or(&report.query), c.value),
            None => println!("{}: n/a", report.query),
        }
        return;
    }

    print_banner(quiet);
    println!(" Query: {}\n", report.query.bold());

    if !report.aligned {
        println!(
            " {} The two catalogs matched different companies for \"{}\"; refine search.\n",
            "[WARN]".yellow().bold(),
            report.query
        );
    }

    if let Some(composite) = report.composite {
        let name = report.display_name.as_deref().unwrap_or(&report.query);
        let mut sources = Vec::new();
        if composite.provenance.rubric_used {
            sources.push("policy rubric");
        }
        if composite.provenance.review_used {
            sources.push("terms review");
        }
        println!(
            " {}  {}  {}",
            name.bold(),
            colored_score(composite.value),
            format!("(from {})", sources.join(" + ")).dimmed()
        );
    } else if report.aligned {
        println!(" {} No score available for {}", "✗".red(), report.query);
    }
    if let Some(image) = &report.image {
        println!(" Image: {}", image.dimmed());
    }
    println!();

    render_policy_section(report, verbose);
    render_review_section(report, verbose);

    if !report.links.is_empty() {
        println!(" {} Policy documents:", "[LINKS]".cyan().bold());
        for link in &report.links {
            println!("   {} {}", link.label, link.url.dimmed());
        }
        println!();
    }
}

fn render_policy_section(report: &LookupReport, verbose: bool) {
    println!(" {} Policy rubric", "[RUBRIC]".cyan().bold());
    let Some(m) = report.policy.resolved() else {
        if let Some(line) = status_line(Catalog::Policy, &report.policy, &report.query) {
            println!("   {}\n", line.yellow());
        }
        return;
    };

    let record = &m.record;
    if m.matched_slug != record.slug {
        println!(
            "   {} is owned by {} ({})",
            m.matched_slug,
            record.name.bold(),
            m.chain.join(" → ").dimmed()
        );
    }
    println!("   {}  {}", record.name, colored_score(record.score));

    if verbose && !record.rubric.is_empty() {
        let mut table = new_table();
        table.set_header(header(&["Category", "Question", "Answer", "Points"]));
        for (category, items) in group_rubric(&record.rubric) {
            for item in items {
                let color = match item.band() {
                    GradeBand::Good => Color::Green,
                    GradeBand::Fair => Color::Yellow,
                    GradeBand::Poor => Color::Red,
                };
                table.add_row(vec![
                    Cell::new(category),
                    Cell::new(&item.question_text),
                    Cell::new(&item.chosen_option_text).fg(color),
                    Cell::new(format!("{}/{}", item.score, item.total_points))
                        .set_alignment(CellAlignment::Right),
                ]);
            }
        }
        println!("{}", table);
    }
    println!();
}

fn render_review_section(report: &LookupReport, verbose: bool) {
    println!(" {} Terms review", "[REVIEW]".cyan().bold());
    let Some(record) = report.review.resolved() else {
        if let Some(line) = status_line(Catalog::Review, &report.review, &report.query) {
            println!("   {}\n", line.yellow());
        }
        return;
    };

    let rating = record.rating.to_string();
    println!(
        "   {}  Grade {}  {}",
        record.name,
        rating.bold(),
        format!("({}/10)", grade_rating(&rating)).dimmed()
    );

    if verbose && !record.points.is_empty() {
        let mut table = new_table();
        table.set_header(header(&["Classification", "Point"]));
        for (classification, points) in group_points(&record.points) {
            let color = match classification {
                Classification::Good => Color::Green,
                Classification::Neutral => Color::DarkGrey,
                Classification::Bad => Color::Yellow,
                Classification::Blocker => Color::Red,
            };
            for point in points {
                table.add_row(vec![
                    Cell::new(classification.to_string()).fg(color),
                    Cell::new(&point.title),
                ]);
            }
        }
        println!("{}", table);
    }
    println!();
}

/// Two lookups side by side.
pub fn render_compare(left: &LookupReport, right: &LookupReport, quiet: bool) {
    if quiet {
        render_lookup(left, false, true);
        render_lookup(right, false, true);
        return;
    }
    print_banner(quiet);

    let name = |r: &LookupReport| r.display_name.clone().unwrap_or_else(|| r.query.clone());
    let score_cell = |r: &LookupReport| match r.composite {
        Some(c) => Cell::new(format!("{:.1}", c.value)).fg(score_color(c.value)),
        None => Cell::new("n/a").fg(Color::DarkGrey),
    };
    let policy_cell = |r: &LookupReport| match r.policy.resolved() {
        Some(m) => Cell::new(format!("{:.1}", m.record.score)).fg(score_color(m.record.score)),
        None => Cell::new(status_line(Catalog::Policy, &r.policy, &r.query).unwrap_or_default()),
    };
    let review_cell = |r: &LookupReport| match r.review.resolved() {
        Some(rec) => Cell::new(rec.rating.to_string()),
        None => Cell::new(status_line(Catalog::Review, &r.review, &r.query).unwrap_or_default()),
    };

    let mut table = new_table();
    table.set_header(vec![Cell::new(""), Cell::new(name(left)).add_attribute(Attribute::Bold), Cell::new(name(right)).add_attribute(Attribute::Bold)]);
    table.add_row(vec![Cell::new("Composite"), score_cell(left), score_cell(right)]);
    table.add_row(vec![Cell::new("Policy rubric"), policy_cell(left), policy_cell(right)]);
    table.add_row(vec![Cell::new("Terms review"), review_cell(left), review_cell(right)]);
    println!("{}", table);

    for report in [left, right] {
        if !report.aligned {
            println!(
                " {} Catalogs disagree for \"{}\"; refine search.",
                "[WARN]".yellow().bold(),
                report.query
            );
        }
    }
}

/// Telemetry view of one domain.
pub fn render_site(
    metrics: &SiteMetrics,
    categories: &[CategoryShare],
    trackers: &[&TrackerFact],
    stats: &RunStats,
    verbose: bool,
    quiet: bool,
) {
    if quiet {
        println!("{}: {}", metrics.site, metrics.display_score());
        return;
    }
    print_banner(quiet);

    let score = f64::from(metrics.display_score());
    println!(" {}  {}\n", metrics.site.bold(), colored_score(score));

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "TRACKING".bold());
    println!(" │  {:<48} │", format!("Trackers            : {:>6}", metrics.total_trackers));
    println!(" │  {:<48} │", format!("Advertising trackers: {:>6}", metrics.total_ad_trackers));
    println!(" │  {:<48} │", format!("Companies (avg)     : {:>6.1}", metrics.companies));
    println!(" │  {:<48} │", format!("Pages tracked       : {:>5.1}%", metrics.tracked * 100.0));
    println!(" │  {:<48} │", format!("Referer leaked      : {:>5.1}%", metrics.referer_leaked * 100.0));
    let tracking = metrics
        .percentage_tracking_requests
        .map(|p| format!("{p:>5.1}%"))
        .unwrap_or_else(|| "  n/a".to_string());
    println!(" │  {:<48} │", format!("Tracking requests   : {tracking}"));
    println!(" └────────────────────────────────────────────────────┘\n");

    if !categories.is_empty() {
        let mut table = new_table();
        table.set_header(header(&["Category", "Trackers", "Share"]));
        for share in categories {
            table.add_row(vec![
                Cell::new(&share.category),
                Cell::new(share.num_trackers).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.2}%", share.percent)).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{}\n", table);
    }

    if verbose && !trackers.is_empty() {
        let mut table = new_table();
        table.set_header(header(&["Tracker", "Category", "Company", "Reach"]));
        for fact in trackers {
            table.add_row(vec![
                Cell::new(fact.tracker_name.as_deref().unwrap_or(&fact.tracker_id)),
                Cell::new(fact.category.as_deref().unwrap_or("-")),
                Cell::new(fact.owning_company.as_deref().unwrap_or("-")),
                Cell::new(fact.reach.map(|r| format!("{r:.4}")).unwrap_or_else(|| "-".into()))
                    .set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{}\n", table);
    }

    if stats.total_skipped() > 0 {
        eprintln!(
            " {} {} malformed rows skipped while loading telemetry",
            "⚠".yellow(),
            stats.total_skipped()
        );
    }
}

/// A plain numbered list (domains or catalog names).
pub fn render_names<S: AsRef<str>>(title: &str, names: &[S], quiet: bool) {
    if quiet {
        for name in names {
            println!("{}", name.as_ref());
        }
        return;
    }
    print_banner(quiet);
    println!(" {} ({})\n", title.bold(), names.len());
    let width = names.len().to_string().len();
    for (i, name) in names.iter().enumerate() {
        println!(" {:>width$}. {}", i + 1, name.as_ref());
    }
}
