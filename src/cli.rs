use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use budgetrack::models::{CategoryId, Charge, ChargeId, NewCategory, NewUser, UserId};
use budgetrack::{RecordStore, SummaryEngine, SummaryStore};

pub(crate) fn as_cli<S>(args: &[String], engine: &SummaryEngine<S>) -> Result<()>
where
    S: SummaryStore + RecordStore,
{
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };
    match command.as_str() {
        "summary" | "s" => cli_summary(&args[2..], engine),
        "users" => cli_users(engine.store()),
        "add-user" => cli_add_user(&args[2..], engine.store()),
        "add-category" => cli_add_category(&args[2..], engine.store()),
        "add-charge" => cli_add_charge(&args[2..], engine.store()),
        "delete-charge" => cli_delete_charge(&args[2..], engine.store()),
        "delete-category" => cli_delete_category(&args[2..], engine.store()),
        "demo" => cli_demo(engine),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("budgetrack {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("budgetrack: recompute cached budget totals from charges");
    println!();
    println!("Usage: budgetrack <command>");
    println!();
    println!("Commands:");
    println!("  summary <user-id>                       Recompute and print a user's summary as JSON");
    println!("  users                                   List users");
    println!("  add-user <name>                         Create a user");
    println!("    --allotment <amount>                  Total allotment (default: 0)");
    println!("  add-category <user-id> <title> <allotment>");
    println!("                                          Create a category");
    println!("  add-charge <user-id> <category-id> <amount> <description>");
    println!("    --date <YYYY-MM-DD>                   Charge date (default: today)");
    println!("  delete-charge <user-id> <charge-id>     Delete a charge");
    println!("  delete-category <user-id> <category-id> Delete a category and its charges");
    println!("  demo                                    Seed a sample budget and print its summary");
    println!("  --help, -h                              Show this help");
    println!("  --version, -V                           Show version");
    println!();
    println!("Environment:");
    println!("  BUDGETRACK_BACKEND   sqlite (default) or document (in-memory)");
    println!("  BUDGETRACK_DB        database path for the sqlite backend");
    println!("  BUDGETRACK_LOG       log filter (default: budgetrack=info)");
}

fn cli_summary<S: SummaryStore>(args: &[String], engine: &SummaryEngine<S>) -> Result<()> {
    let Some(user_id) = args.first() else {
        anyhow::bail!("Usage: budgetrack summary <user-id>");
    };
    let summary = match engine.recompute_summary(user_id) {
        Ok(summary) => summary,
        Err(e) => anyhow::bail!("{e} (status {})", e.http_status()),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cli_users<S: RecordStore>(store: &S) -> Result<()> {
    let users = store.list_users()?;
    if users.is_empty() {
        println!("No users. Create one with: budgetrack add-user <name>");
        return Ok(());
    }
    for user in &users {
        println!(
            "{}  {:<20} spent {:>10}  of {:>10}",
            user.id, user.name, user.total_amount, user.total_allotment
        );
    }
    Ok(())
}

fn cli_add_user<S: RecordStore>(args: &[String], store: &S) -> Result<()> {
    let Some(name) = args.first().filter(|a| !a.starts_with('-')) else {
        anyhow::bail!("Usage: budgetrack add-user <name> [--allotment <amount>]");
    };
    let allotment = args
        .windows(2)
        .find(|w| w[0] == "--allotment")
        .map(|w| parse_amount(&w[1]))
        .transpose()?
        .unwrap_or(Decimal::ZERO);

    let user = store.insert_user(NewUser::new(name.clone(), allotment))?;
    println!("{}", user.id);
    Ok(())
}

fn cli_add_category<S: RecordStore>(args: &[String], store: &S) -> Result<()> {
    let [user_id, title, allotment, ..] = args else {
        anyhow::bail!("Usage: budgetrack add-category <user-id> <title> <allotment>");
    };
    let user_id = parse_id::<UserId>(user_id, "user")?;
    let allotment = parse_amount(allotment)?;

    let category = store.insert_category(NewCategory::new(user_id, title.clone(), allotment))?;
    println!("{}", category.id);
    Ok(())
}

fn cli_add_charge<S: RecordStore>(args: &[String], store: &S) -> Result<()> {
    let [user_id, category_id, amount, description, ..] = args else {
        anyhow::bail!(
            "Usage: budgetrack add-charge <user-id> <category-id> <amount> <description> [--date <YYYY-MM-DD>]"
        );
    };
    let user_id = parse_id::<UserId>(user_id, "user")?;
    let category_id = parse_id::<CategoryId>(category_id, "category")?;
    let amount = parse_amount(amount)?;

    let date = args
        .windows(2)
        .find(|w| w[0] == "--date")
        .map(|w| {
            NaiveDate::parse_from_str(&w[1], "%Y-%m-%d")
                .with_context(|| format!("Invalid date: {} (expected YYYY-MM-DD)", w[1]))
        })
        .transpose()?;

    let charge = match date {
        Some(date) => Charge::new(user_id, category_id, description.clone(), amount, date),
        None => Charge::today(user_id, category_id, description.clone(), amount),
    };
    store
        .insert_charge(&charge)
        .context("Failed to insert charge (does the category exist?)")?;
    println!("{}", charge.id);
    Ok(())
}

fn cli_delete_charge<S: RecordStore>(args: &[String], store: &S) -> Result<()> {
    let [user_id, charge_id, ..] = args else {
        anyhow::bail!("Usage: budgetrack delete-charge <user-id> <charge-id>");
    };
    let user_id = parse_id::<UserId>(user_id, "user")?;
    let charge_id = parse_id::<ChargeId>(charge_id, "charge")?;

    if !store.delete_charge(user_id, charge_id)? {
        anyhow::bail!("Charge {charge_id} not found for user {user_id}");
    }
    println!("Deleted charge {charge_id}");
    Ok(())
}

fn cli_delete_category<S: RecordStore>(args: &[String], store: &S) -> Result<()> {
    let [user_id, category_id, ..] = args else {
        anyhow::bail!("Usage: budgetrack delete-category <user-id> <category-id>");
    };
    let user_id = parse_id::<UserId>(user_id, "user")?;
    let category_id = parse_id::<CategoryId>(category_id, "category")?;

    if !store.delete_category(user_id, category_id)? {
        anyhow::bail!("Category {category_id} not found for user {user_id}");
    }
    println!("Deleted category {category_id} and its charges");
    Ok(())
}

/// Seeds a user with Food (two 25.00 charges) and Gas (none), then prints the
/// recomputed summary.
fn cli_demo<S>(engine: &SummaryEngine<S>) -> Result<()>
where
    S: SummaryStore + RecordStore,
{
    let store = engine.store();
    let user = store.insert_user(NewUser::new("Demo".into(), Decimal::new(550, 0)))?;
    let food = store.insert_category(NewCategory::new(
        user.id,
        "Food".into(),
        Decimal::new(400, 0),
    ))?;
    store.insert_category(NewCategory::new(
        user.id,
        "Gas".into(),
        Decimal::new(150, 0),
    ))?;
    for description in ["Groceries", "Takeout"] {
        store.insert_charge(&Charge::today(
            user.id,
            food.id,
            description.into(),
            Decimal::new(2500, 2),
        ))?;
    }

    let summary = match engine.recompute_summary(&user.id.to_string()) {
        Ok(summary) => summary,
        Err(e) => anyhow::bail!("{e} (status {})", e.http_status()),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_id<T>(raw: &str, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .with_context(|| format!("Invalid {what} id: {raw}"))
}

fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    Decimal::from_str(&cleaned).with_context(|| format!("Invalid amount: {raw}"))
}
