use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use stride_core::*;

#[derive(Parser)]
#[command(name = "stride")]
#[command(about = "Race-training plan tracker with a generative coach", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a plan and generate its first schedule window
    New {
        /// What you are training for
        goal: String,

        /// Race date (YYYY-MM-DD)
        #[arg(long)]
        race: NaiveDate,

        /// First training day, defaults to today
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Plan title, defaults to the goal
        #[arg(long)]
        title: Option<String>,

        /// Skip the generation call (for testing)
        #[arg(long)]
        no_generate: bool,
    },

    /// List plans, newest first
    List,

    /// Show a plan's calendar grouped by month
    Show {
        /// Plan id (or unique prefix), defaults to the newest plan
        #[arg(long)]
        plan: Option<String>,
    },

    /// Log a workout session against a day
    Log {
        #[arg(long)]
        plan: Option<String>,

        /// Day to log against, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Distance in kilometers
        #[arg(long)]
        distance: f64,

        /// Duration as MM:SS or HH:MM:SS
        #[arg(long)]
        duration: Option<String>,

        /// Rating of Perceived Exertion, 1-10
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        rpe: Option<u8>,

        /// Free-text notes
        #[arg(long)]
        feeling: Option<String>,
    },

    /// Regenerate the remaining schedule from logged performance
    Adjust {
        #[arg(long)]
        plan: Option<String>,
    },

    /// Talk to the coach; requested schedule changes apply automatically
    Chat {
        #[arg(long)]
        plan: Option<String>,

        /// Single message; omit for an interactive conversation
        message: Option<String>,
    },

    /// Ask the coach for feedback on one day
    Feedback {
        #[arg(long)]
        plan: Option<String>,

        #[arg(long)]
        date: NaiveDate,
    },

    /// Rename a plan
    Rename {
        #[arg(long)]
        plan: Option<String>,

        title: String,
    },

    /// Delete a plan and all of its day logs
    Delete {
        /// Plan id (or unique prefix)
        plan: String,
    },

    /// Export a plan's day logs to CSV
    Export {
        #[arg(long)]
        plan: Option<String>,

        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    stride_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    let mut session = SessionContext::init(&data_dir)?;

    match cli.command {
        Commands::New {
            goal,
            race,
            start,
            title,
            no_generate,
        } => cmd_new(&mut session, &config, goal, race, start, title, no_generate),
        Commands::List => cmd_list(&mut session),
        Commands::Show { plan } => cmd_show(&mut session, plan.as_deref()),
        Commands::Log {
            plan,
            date,
            distance,
            duration,
            rpe,
            feeling,
        } => cmd_log(&mut session, plan.as_deref(), date, distance, duration, rpe, feeling),
        Commands::Adjust { plan } => cmd_adjust(&mut session, &config, plan.as_deref()),
        Commands::Chat { plan, message } => {
            cmd_chat(&mut session, &config, &data_dir, plan.as_deref(), message)
        }
        Commands::Feedback { plan, date } => {
            cmd_feedback(&mut session, &config, plan.as_deref(), date)
        }
        Commands::Rename { plan, title } => cmd_rename(&mut session, plan.as_deref(), title),
        Commands::Delete { plan } => cmd_delete(&mut session, &plan),
        Commands::Export { plan, output } => cmd_export(&mut session, plan.as_deref(), &output),
    }
}

/// Resolve a plan from an id prefix, or fall back to the newest plan
fn resolve_plan(session: &mut SessionContext, wanted: Option<&str>) -> Result<Plan> {
    let plans = session.plans();
    match wanted {
        Some(prefix) => {
            let matches: Vec<&Plan> = plans.iter().filter(|p| p.id.starts_with(prefix)).collect();
            match matches.as_slice() {
                [plan] => Ok((*plan).clone()),
                [] => Err(Error::Session(format!("no plan matches \"{}\"", prefix))),
                _ => Err(Error::Session(format!(
                    "\"{}\" matches more than one plan, use a longer prefix",
                    prefix
                ))),
            }
        }
        None => plans
            .first()
            .cloned()
            .ok_or_else(|| Error::Session("no plans yet, create one with `stride new`".into())),
    }
}

fn cmd_new(
    session: &mut SessionContext,
    config: &Config,
    goal: String,
    race: NaiveDate,
    start: Option<NaiveDate>,
    title: Option<String>,
    no_generate: bool,
) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let start = start.unwrap_or(today);
    let plan = Plan::new(goal, title, start, race)?;

    let mut batch = WriteBatch::new();
    batch.push(WriteOp::UpsertPlan(plan.clone()));
    session.store().commit(batch)?;
    session.select_plan(&plan.id)?;

    println!("✓ Plan created: {} ({})", plan.title, short_id(&plan.id));
    println!("  {} to {}", plan.start_date, plan.race_date);

    if no_generate {
        println!("  [Generation skipped]");
        return Ok(());
    }

    let endpoint = CoachEndpoint::from_config(&config.coach)?;
    let _guard = session.begin(Op::Generate)?;
    let days = session.days().clone();

    match generate::request_plan(&endpoint, &plan, &days, today, false) {
        Some(proposals) => {
            let batch = merge::plan_update_batch(&plan, &proposals);
            let count = batch.len();
            session.store().commit(batch)?;
            println!("✓ Generated {} days", count);
        }
        None => {
            eprintln!("No plan produced. The schedule was left unchanged; try `stride adjust` later.");
        }
    }

    Ok(())
}

fn cmd_list(session: &mut SessionContext) -> Result<()> {
    let plans = session.plans().to_vec();
    if plans.is_empty() {
        println!("No plans yet. Create one with `stride new`.");
        return Ok(());
    }

    for plan in plans {
        println!(
            "{}  {}  ({} to {})",
            short_id(&plan.id),
            plan.title,
            plan.start_date,
            plan.race_date
        );
    }
    Ok(())
}

fn cmd_show(session: &mut SessionContext, wanted: Option<&str>) -> Result<()> {
    let plan = resolve_plan(session, wanted)?;
    session.select_plan(&plan.id)?;
    let days = session.days().clone();

    println!("╭─────────────────────────────────────────╮");
    println!("│  {}", plan.title);
    println!("╰─────────────────────────────────────────╯");
    println!("  Goal: {}", plan.goal);
    println!("  Race: {}", plan.race_date);

    let mut current_month = String::new();
    for date in days_between(plan.start_date, plan.race_date) {
        let group = month_group(date);
        if group.sort_key != current_month {
            current_month = group.sort_key;
            println!();
            println!("  {}", group.label);
            println!("  ─────────────────────");
        }

        let log = days.get(&date);
        let planned = log
            .and_then(|l| l.planned_activity.as_deref())
            .unwrap_or("(rest/TBD)");
        print!("  {}  {}", date, planned);

        if let Some(log) = log.filter(|l| l.is_completed()) {
            let distance = log.actual_distance.unwrap_or(0.0);
            print!("  ✓ {:.1} km", distance);
            if let Some(duration) = &log.duration {
                print!(" in {}", duration);
                if let Some(pace) = pace::pace_per_km(distance, duration) {
                    print!(" ({})", pace);
                }
            }
            if let Some(rpe) = log.rpe {
                print!(" RPE {}", rpe);
            }
        }
        println!();
    }

    Ok(())
}

fn cmd_log(
    session: &mut SessionContext,
    wanted: Option<&str>,
    date: Option<NaiveDate>,
    distance: f64,
    duration: Option<String>,
    rpe: Option<u8>,
    feeling: Option<String>,
) -> Result<()> {
    let plan = resolve_plan(session, wanted)?;
    session.select_plan(&plan.id)?;
    let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());

    // Append to the day's existing sessions (a double day has several)
    let mut activities = session
        .days()
        .get(&date)
        .map(|log| log.activities.clone())
        .unwrap_or_default();
    activities.push(ActivityEntry {
        actual_distance: distance,
        duration: duration.clone().unwrap_or_default(),
        rpe: rpe.unwrap_or(5),
        feeling: feeling.unwrap_or_default(),
    });
    let session_count = activities.len();

    session
        .store()
        .commit(merge::log_day_batch(&plan.id, date, activities))?;

    print!("✓ Logged {:.1} km on {}", distance, date);
    if let Some(duration) = &duration {
        if let Some(pace) = pace::pace_per_km(distance, duration) {
            print!(" ({})", pace);
        }
    }
    if session_count > 1 {
        print!(" [session {} of the day]", session_count);
    }
    println!();
    Ok(())
}

fn cmd_adjust(session: &mut SessionContext, config: &Config, wanted: Option<&str>) -> Result<()> {
    let plan = resolve_plan(session, wanted)?;
    session.select_plan(&plan.id)?;

    let endpoint = CoachEndpoint::from_config(&config.coach)?;
    let _guard = session.begin(Op::Adjust)?;
    let today = chrono::Local::now().date_naive();
    let days = session.days().clone();

    match generate::request_plan(&endpoint, &plan, &days, today, true) {
        Some(proposals) => {
            let batch = merge::plan_update_batch(&plan, &proposals);
            let count = batch.len();
            session.store().commit(batch)?;
            println!("✓ Adjusted the remaining schedule: {} days", count);
        }
        None => {
            eprintln!("No plan produced. The schedule was left unchanged.");
        }
    }
    Ok(())
}

fn cmd_chat(
    session: &mut SessionContext,
    config: &Config,
    data_dir: &std::path::Path,
    wanted: Option<&str>,
    message: Option<String>,
) -> Result<()> {
    let plan = resolve_plan(session, wanted)?;
    session.select_plan(&plan.id)?;

    let endpoint = CoachEndpoint::from_config(&config.coach)?;
    let transcript_path = data_dir
        .join("users")
        .join(session.identity().user_id.to_string())
        .join("chats")
        .join(format!("{}.jsonl", plan.id));

    let history = transcript::read_turns(&transcript_path)?;
    let mut chat = CoachChat::with_history(history);
    let mut sink = JsonlTranscript::new(&transcript_path);

    if let Some(message) = message {
        return chat_turn(session, &endpoint, &mut chat, &mut sink, &plan, &message);
    }

    println!("Chatting about \"{}\". Empty line or 'quit' to leave.", plan.title);
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("quit") {
            break;
        }
        chat_turn(session, &endpoint, &mut chat, &mut sink, &plan, input)?;
    }
    Ok(())
}

fn chat_turn(
    session: &SessionContext,
    endpoint: &CoachEndpoint,
    chat: &mut CoachChat,
    sink: &mut JsonlTranscript,
    plan: &Plan,
    message: &str,
) -> Result<()> {
    let _guard = session.begin(Op::ChatTurn)?;
    let outcome = chat.send(endpoint, session.store(), plan, message);

    sink.append(&ChatTurn::user(message))?;
    sink.append(&ChatTurn::model(outcome.reply.clone()))?;

    println!("{}", outcome.reply);
    Ok(())
}

fn cmd_feedback(
    session: &mut SessionContext,
    config: &Config,
    wanted: Option<&str>,
    date: NaiveDate,
) -> Result<()> {
    let plan = resolve_plan(session, wanted)?;
    session.select_plan(&plan.id)?;

    let endpoint = CoachEndpoint::from_config(&config.coach)?;
    let _guard = session.begin(Op::Feedback)?;

    let day = session
        .days()
        .get(&date)
        .cloned()
        .unwrap_or_else(|| DayLog::new(date));

    match feedback::request_feedback(&endpoint, &plan, &day) {
        Some(text) => {
            session
                .store()
                .commit(merge::feedback_batch(&plan.id, date, text.clone()))?;
            println!("{}", text);
        }
        None => {
            eprintln!("No feedback produced. Try again in a moment.");
        }
    }
    Ok(())
}

fn cmd_rename(session: &mut SessionContext, wanted: Option<&str>, title: String) -> Result<()> {
    let plan = resolve_plan(session, wanted)?;

    let mut batch = WriteBatch::new();
    batch.push(WriteOp::SetPlanTitle {
        plan_id: plan.id.clone(),
        title: title.clone(),
    });
    session.store().commit(batch)?;

    println!("✓ Renamed to {}", title);
    Ok(())
}

fn cmd_delete(session: &mut SessionContext, wanted: &str) -> Result<()> {
    let plan = resolve_plan(session, Some(wanted))?;
    let day_keys: Vec<NaiveDate> = session.store().days(&plan.id).keys().copied().collect();
    let count = day_keys.len();

    session
        .store()
        .commit(merge::delete_plan_batch(&plan.id, day_keys))?;
    if session.current_plan_id() == Some(plan.id.as_str()) {
        session.clear_plan();
    }

    println!("✓ Deleted {} and {} day logs", plan.title, count);
    Ok(())
}

fn cmd_export(session: &mut SessionContext, wanted: Option<&str>, output: &std::path::Path) -> Result<()> {
    let plan = resolve_plan(session, wanted)?;
    let days = session.store().days(&plan.id);

    let count = export::export_plan_csv(&days, output)?;
    println!("✓ Exported {} day logs to {}", count, output.display());
    Ok(())
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}
