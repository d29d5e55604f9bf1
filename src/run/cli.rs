use anyhow::{Context, Result};
use std::path::Path;

use budget_ledger::{CategorySummary, Ledger, Overview};

use super::format::{format_amount, format_percent, parse_amount, parse_id, truncate};

pub(crate) fn as_cli(args: &[String], ledger: &Ledger) -> Result<()> {
    let rest = args.get(2..).unwrap_or(&[]);
    match args.get(1).map(String::as_str) {
        None | Some("summary" | "s") => cli_summary(rest, ledger),
        Some("categories" | "cats") => cli_categories(ledger),
        Some("category" | "cat") => cli_category(rest, ledger),
        Some("transactions" | "txns") => cli_transactions(rest, ledger),
        Some("txn") => cli_txn(rest, ledger),
        Some("export") => cli_export(rest, ledger),
        Some("--help" | "-h" | "help") => {
            print_usage();
            Ok(())
        }
        Some("--version" | "-V" | "version") => {
            println!("budget-ledger {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(other) => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("budget-ledger — category budgets with enforced spending limits");
    println!();
    println!("Usage: budget-ledger [command]");
    println!();
    println!("Commands:");
    println!("  summary [category-id]                      Overview of all categories (default)");
    println!("  categories                                 List categories");
    println!("  category add <name> <limit>                Create a category");
    println!("  category edit <id> <name> <limit>          Rename a category or change its limit");
    println!("  category rm <id>                           Delete a category and its transactions");
    println!("  transactions [--category <id>]             List transactions, newest first");
    println!("  txn add <description> <amount> <cat-id>    Record a transaction");
    println!("  txn edit <id> <description> <amount> <cat-id>");
    println!("                                             Change or move a transaction");
    println!("  txn rm <id>                                Delete a transaction");
    println!("  export [path]                              Export transactions to CSV");
    println!("  --help, -h                                 Show this help");
    println!("  --version, -V                              Show version");
    println!();
    println!("Environment:");
    println!("  BUDGET_LEDGER_DB             Database path");
    println!("  BUDGET_LEDGER_DELETE_POLICY  'cascade' (default) or 'block'");
    println!("  RUST_LOG                     Log filter, e.g. budget_ledger=debug");
}

// ── Summaries ─────────────────────────────────────────────────

fn cli_summary(args: &[String], ledger: &Ledger) -> Result<()> {
    if let Some(id) = args.first() {
        let summary = ledger.category_summary(parse_id(id, "category")?)?;
        print_category_detail(&summary);
        return Ok(());
    }

    let overview = ledger.list_category_summaries()?;
    print_overview(&overview);
    Ok(())
}

fn print_overview(overview: &Overview) {
    if overview.categories.is_empty() {
        println!("No categories");
        return;
    }

    println!(
        "{:<4} {:<20} {:>14} {:>14} {:>14} {:>7}",
        "ID", "Category", "Limit", "Spent", "Remaining", "Used"
    );
    println!("{}", "─".repeat(78));
    for s in &overview.categories {
        println!(
            "{:<4} {:<20} {:>14} {:>14} {:>14} {:>7}",
            s.category.id,
            truncate(&s.category.name, 20),
            format_amount(s.limit()),
            format_amount(s.spent),
            format_amount(s.remaining),
            format_percent(s.percent_used),
        );
    }
    println!("{}", "─".repeat(78));
    let totals = &overview.totals;
    println!(
        "{:<4} {:<20} {:>14} {:>14} {:>14} {:>7}",
        "",
        "Total",
        format_amount(totals.limit),
        format_amount(totals.spent),
        format_amount(totals.remaining),
        format_percent(totals.percent_used()),
    );
}

fn print_category_detail(summary: &CategorySummary) {
    println!("{} (#{})", summary.category.name, summary.category.id);
    println!("{}", "─".repeat(40));
    println!("  Limit:        {}", format_amount(summary.limit()));
    println!("  Spent:        {}", format_amount(summary.spent));
    println!("  Remaining:    {}", format_amount(summary.remaining));
    println!("  Used:         {}", format_percent(summary.percent_used));
    println!("  Transactions: {}", summary.transaction_count);
}

// ── Categories ────────────────────────────────────────────────

fn cli_categories(ledger: &Ledger) -> Result<()> {
    let categories = ledger.list_categories()?;
    if categories.is_empty() {
        println!("No categories");
        return Ok(());
    }

    println!("{:<4} {:<30} {:>14}", "ID", "Name", "Limit");
    println!("{}", "─".repeat(50));
    for cat in &categories {
        println!(
            "{:<4} {:<30} {:>14}",
            cat.id,
            truncate(&cat.name, 30),
            format_amount(cat.limit)
        );
    }
    Ok(())
}

fn cli_category(args: &[String], ledger: &Ledger) -> Result<()> {
    match (args.first().map(String::as_str), args.get(1..).unwrap_or(&[])) {
        (Some("add"), [name, limit]) => {
            let cat = ledger.create_category(name, parse_amount(limit)?)?;
            println!(
                "Created category '{}' (#{}) with limit {}",
                cat.name,
                cat.id,
                format_amount(cat.limit)
            );
        }
        (Some("edit"), [id, name, limit]) => {
            let cat = ledger.update_category(parse_id(id, "category")?, name, parse_amount(limit)?)?;
            println!(
                "Updated category '{}' (#{}), limit {}",
                cat.name,
                cat.id,
                format_amount(cat.limit)
            );
        }
        (Some("rm"), [id]) => {
            let notice = ledger.delete_category(parse_id(id, "category")?)?;
            if notice.cascaded() {
                println!(
                    "Deleted category '{}' and {} transaction(s)",
                    notice.category_name, notice.transactions_removed
                );
            } else {
                println!("Deleted category '{}'", notice.category_name);
            }
        }
        _ => anyhow::bail!(
            "Usage: budget-ledger category add <name> <limit> | edit <id> <name> <limit> | rm <id>"
        ),
    }
    Ok(())
}

// ── Transactions ──────────────────────────────────────────────

fn cli_transactions(args: &[String], ledger: &Ledger) -> Result<()> {
    let category_id = args
        .windows(2)
        .find(|w| w[0] == "--category")
        .map(|w| parse_id(&w[1], "category"))
        .transpose()?;

    let details = ledger.transaction_details()?;
    let rows: Vec<_> = details
        .iter()
        .filter(|d| category_id.map_or(true, |id| d.transaction.belongs_to(id)))
        .collect();

    if let Some(id) = category_id {
        // Distinguish an empty category from a missing one.
        ledger.get_category(id)?;
    }
    if rows.is_empty() {
        println!("No transactions");
        return Ok(());
    }

    println!(
        "{:<5} {:<19} {:<30} {:<16} {:>12}",
        "ID", "Created", "Description", "Category", "Amount"
    );
    println!("{}", "─".repeat(86));
    for d in rows {
        let txn = &d.transaction;
        println!(
            "{:<5} {:<19} {:<30} {:<16} {:>12}",
            txn.id,
            truncate(&txn.created_at.replace('T', " "), 19),
            truncate(&txn.description, 30),
            truncate(&d.category_name, 16),
            format_amount(txn.amount)
        );
    }
    Ok(())
}

fn cli_txn(args: &[String], ledger: &Ledger) -> Result<()> {
    match (args.first().map(String::as_str), args.get(1..).unwrap_or(&[])) {
        (Some("add"), [description, amount, category_id]) => {
            let txn = ledger.create_transaction(
                description,
                parse_amount(amount)?,
                parse_id(category_id, "category")?,
            )?;
            println!(
                "Recorded transaction #{}: {} {}",
                txn.id,
                txn.description,
                format_amount(txn.amount)
            );
        }
        (Some("edit"), [id, description, amount, category_id]) => {
            let txn = ledger.update_transaction(
                parse_id(id, "transaction")?,
                description,
                parse_amount(amount)?,
                parse_id(category_id, "category")?,
            )?;
            println!(
                "Updated transaction #{}: {} {}",
                txn.id,
                txn.description,
                format_amount(txn.amount)
            );
        }
        (Some("rm"), [id]) => {
            let id = parse_id(id, "transaction")?;
            ledger.delete_transaction(id)?;
            println!("Deleted transaction #{id}");
        }
        _ => anyhow::bail!(
            "Usage: budget-ledger txn add <description> <amount> <category-id> \
             | edit <id> <description> <amount> <category-id> | rm <id>"
        ),
    }
    Ok(())
}

// ── Export ────────────────────────────────────────────────────

fn cli_export(args: &[String], ledger: &Ledger) -> Result<()> {
    // Output path is the first non-flag argument
    let output_path = args
        .first()
        .filter(|a| !a.starts_with('-'))
        .map(|a| shellexpand(a))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            format!("{home}/budget-ledger-export.csv")
        });

    let count = export_to_csv(ledger, Path::new(&output_path))?;
    if count == 0 {
        println!("No transactions to export");
    } else {
        println!("Exported {count} transactions to {output_path}");
    }
    Ok(())
}

/// Write every transaction, newest first, with its category name.
pub(crate) fn export_to_csv(ledger: &Ledger, path: &Path) -> Result<usize> {
    let details = ledger.transaction_details()?;
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(["id", "created_at", "updated_at", "description", "category", "amount"])?;
    for d in &details {
        let txn = &d.transaction;
        wtr.write_record([
            txn.id.to_string(),
            txn.created_at.clone(),
            txn.updated_at.clone(),
            txn.description.clone(),
            d.category_name.clone(),
            txn.amount.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(details.len())
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod cli_tests;
