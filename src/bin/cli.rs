use chrono::NaiveDate;
use contract_progress::{
    Addendum, Contract, ContractId, MemoryScheduleStore, MonthKey, MonthLabelLocale,
    PaymentStage, ScheduleService, WeekKey, WeekUpdate, config, load_contract_from_json,
    render_text_table, save_contract_to_json, save_schedule_to_csv, schedule_frame,
};
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;

struct Session {
    service: ScheduleService,
    locale: MonthLabelLocale,
}

type CommandResult = Result<(), String>;

fn print_help() {
    println!(
        "Commands:\n  help                                         Show this help\n  contract <id> <YYYY-MM-DD> <days> <value> <name...>\n                                               Create a contract and generate its schedule\n  list                                         List contracts\n  show <id>                                    Show the weekly schedule\n  plan <id> <YYYY-MM> <week> <pct>             Set rencana for a week\n  real <id> <YYYY-MM> <week> <pct>             Set realisasi for a week\n  addendum <id> <no> <YYYY-MM-DD> <days> <value> [note...]\n                                               Apply an addendum and reconcile the schedule\n  regen <id>                                   Regenerate the schedule, keeping progress\n  pay <id> <label> <pct>                       Record a payment stage\n  summary <id> [YYYY-MM-DD]                    Show financial and physical progress\n  locale <en|id>                               Month label language\n  save json <id> <path>                        Save contract and schedule to JSON\n  load json <path>                             Load contract and schedule from JSON\n  export csv <id> <path>                       Export the schedule as CSV\n  quit|exit                                    Exit"
    );
}

fn arg<'a, T: FromStr>(
    parts: &mut impl Iterator<Item = &'a str>,
    name: &str,
    usage: &str,
) -> Result<T, String> {
    let raw = parts.next().ok_or_else(|| format!("Usage: {usage}"))?;
    raw.parse::<T>().map_err(|_| format!("Invalid {name} '{raw}'"))
}

fn date_arg<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    name: &str,
    usage: &str,
) -> Result<NaiveDate, String> {
    let raw = parts.next().ok_or_else(|| format!("Usage: {usage}"))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("Invalid {name} '{raw}' (YYYY-MM-DD)"))
}

fn rest<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join(" ")
}

impl Session {
    fn show(&self, id: ContractId) -> CommandResult {
        let contract = self.service.contract(id).map_err(|e| e.to_string())?;
        let groups = self.service.schedule(id).map_err(|e| e.to_string())?;
        let df = schedule_frame(&groups, self.locale).map_err(|e| e.to_string())?;
        println!(
            "Contract {} - {} ({} days from {})",
            contract.id,
            contract.name,
            contract.effective_duration_days(),
            contract.start_date
        );
        println!("{}", render_text_table(&df));
        Ok(())
    }

    fn create(&self, parts: &mut std::str::SplitWhitespace) -> CommandResult {
        const USAGE: &str = "contract <id> <YYYY-MM-DD> <days> <value> <name...>";
        let id: ContractId = arg(parts, "id", USAGE)?;
        let start = date_arg(parts, "start date", USAGE)?;
        let days: i64 = arg(parts, "duration_days", USAGE)?;
        let value: f64 = arg(parts, "contract value", USAGE)?;
        let name = rest(parts);
        let contract = Contract::new(id, name, start, days, value);
        let groups = self
            .service
            .create_contract(contract)
            .map_err(|e| format!("Error: {e}"))?;
        let weeks: usize = groups.iter().map(|g| g.items.len()).sum();
        println!(
            "Contract {id} created with {weeks} weeks in {} months.",
            groups.len()
        );
        Ok(())
    }

    fn update(&self, cmd: &str, parts: &mut std::str::SplitWhitespace) -> CommandResult {
        let usage = format!("{cmd} <id> <YYYY-MM> <week> <pct>");
        let id: ContractId = arg(parts, "id", &usage)?;
        let month: MonthKey = arg(parts, "month", &usage)?;
        let week: u32 = arg(parts, "week", &usage)?;
        let pct: f64 = arg(parts, "percentage", &usage)?;
        let update = if cmd == "plan" {
            WeekUpdate::rencana(pct)
        } else {
            WeekUpdate::realisasi(pct)
        };
        let key = WeekKey::new(month, week);
        let entry = self
            .service
            .update_week(id, key, &update)
            .map_err(|e| format!("Error: {e}"))?;
        println!(
            "Week {key} updated: rencana={:.2} realisasi={:.2} deviasi={:.2}",
            entry.rencana(),
            entry.realisasi(),
            entry.deviasi()
        );
        Ok(())
    }

    fn addendum(&self, parts: &mut std::str::SplitWhitespace) -> CommandResult {
        const USAGE: &str = "addendum <id> <no> <YYYY-MM-DD> <days> <value> [note...]";
        let id: ContractId = arg(parts, "id", USAGE)?;
        let number: u32 = arg(parts, "addendum number", USAGE)?;
        let signed_on = date_arg(parts, "signing date", USAGE)?;
        let days: i64 = arg(parts, "extra days", USAGE)?;
        let value: f64 = arg(parts, "extra value", USAGE)?;
        let addendum = Addendum::new(number, signed_on, days, value).with_note(rest(parts));
        let contract = self
            .service
            .apply_addendum(id, addendum)
            .map_err(|e| format!("Error: {e}"))?;
        println!(
            "Addendum {number} applied; contract {id} now runs {} days{}.",
            contract.effective_duration_days(),
            contract
                .end_date()
                .map(|end| format!(" until {end}"))
                .unwrap_or_default()
        );
        Ok(())
    }

    fn pay(&self, parts: &mut std::str::SplitWhitespace) -> CommandResult {
        const USAGE: &str = "pay <id> <label> <pct>";
        let id: ContractId = arg(parts, "id", USAGE)?;
        let label: String = arg(parts, "label", USAGE)?;
        let pct: f64 = arg(parts, "percentage", USAGE)?;
        let totals = self
            .service
            .record_payment_stage(id, PaymentStage::new(label, pct))
            .map_err(|e| format!("Error: {e}"))?;
        println!(
            "Financial progress {:.2}% (payment {:.2}).",
            totals.display_progress(),
            totals.total_payment
        );
        Ok(())
    }

    fn summary(&self, parts: &mut std::str::SplitWhitespace) -> CommandResult {
        const USAGE: &str = "summary <id> [YYYY-MM-DD]";
        let id: ContractId = arg(parts, "id", USAGE)?;
        let as_of = match parts.next() {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| format!("Invalid date '{raw}' (YYYY-MM-DD)"))?,
            ),
            None => None,
        };
        let report = self
            .service
            .progress_report(id, as_of)
            .map_err(|e| format!("Error: {e}"))?;
        println!("Duration           : {} days", report.effective_duration_days);
        if let Some(end) = report.end_date {
            println!("End date           : {end}");
        }
        println!(
            "Financial progress : {:.2}% (payment {:.2})",
            report.financial.display_progress(),
            report.financial.total_payment
        );
        println!(
            "Physical progress  : rencana={:.2} realisasi={:.2} deviasi={:.2}",
            report.physical.total_rencana,
            report.physical.total_realisasi,
            report.physical.deviasi
        );
        if let Some(as_of) = report.physical_as_of {
            println!(
                "As of date         : rencana={:.2} realisasi={:.2} deviasi={:.2}",
                as_of.total_rencana, as_of.total_realisasi, as_of.deviasi
            );
        }
        Ok(())
    }

    fn save_json(&self, parts: &mut std::str::SplitWhitespace) -> CommandResult {
        const USAGE: &str = "save json <id> <path>";
        let id: ContractId = arg(parts, "id", USAGE)?;
        let path = parts.next().ok_or_else(|| format!("Usage: {USAGE}"))?;
        let snapshot = self.service.snapshot(id).map_err(|e| format!("Error: {e}"))?;
        save_contract_to_json(&snapshot, path).map_err(|e| format!("Save error: {e}"))?;
        println!("Contract {id} saved to {path}.");
        Ok(())
    }

    fn load_json(&self, parts: &mut std::str::SplitWhitespace) -> CommandResult {
        let path = parts
            .next()
            .ok_or_else(|| "Usage: load json <path>".to_string())?;
        let snapshot = load_contract_from_json(path).map_err(|e| format!("Load error: {e}"))?;
        self.service
            .import_snapshot(&snapshot)
            .map_err(|e| format!("Load error: {e}"))?;
        println!("Contract {} loaded from {path}.", snapshot.contract.id);
        Ok(())
    }

    fn export_csv(&self, parts: &mut std::str::SplitWhitespace) -> CommandResult {
        const USAGE: &str = "export csv <id> <path>";
        let id: ContractId = arg(parts, "id", USAGE)?;
        let path = parts.next().ok_or_else(|| format!("Usage: {USAGE}"))?;
        let groups = self.service.schedule(id).map_err(|e| format!("Error: {e}"))?;
        save_schedule_to_csv(&groups, path).map_err(|e| format!("Export error: {e}"))?;
        println!("Schedule of contract {id} exported to {path}.");
        Ok(())
    }
}

fn main() {
    config::init_logging();
    let mut session = Session {
        service: ScheduleService::new(Arc::new(MemoryScheduleStore::new())),
        locale: MonthLabelLocale::default(),
    };

    println!("Contract Progress (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        let result = match cmd {
            "help" => {
                print_help();
                Ok(())
            }
            "quit" | "exit" => break,
            "contract" => session.create(&mut parts),
            "list" => match session.service.contracts() {
                Ok(contracts) if contracts.is_empty() => {
                    println!("No contracts.");
                    Ok(())
                }
                Ok(contracts) => {
                    for contract in contracts {
                        println!(
                            "{:>4}  {}  {} days  {:.2}  {}",
                            contract.id,
                            contract.start_date,
                            contract.effective_duration_days(),
                            contract.effective_value(),
                            contract.name
                        );
                    }
                    Ok(())
                }
                Err(e) => Err(format!("Error: {e}")),
            },
            "show" => arg(&mut parts, "id", "show <id>").and_then(|id| session.show(id)),
            "plan" | "real" => session.update(cmd, &mut parts),
            "addendum" => session.addendum(&mut parts),
            "regen" => arg(&mut parts, "id", "regen <id>").and_then(|id: ContractId| {
                let groups = session
                    .service
                    .regenerate(id)
                    .map_err(|e| format!("Error: {e}"))?;
                let weeks: usize = groups.iter().map(|g| g.items.len()).sum();
                println!("Schedule of contract {id} regenerated ({weeks} weeks).");
                Ok(())
            }),
            "pay" => session.pay(&mut parts),
            "summary" => session.summary(&mut parts),
            "locale" => arg(&mut parts, "locale", "locale <en|id>").map(|locale| {
                session.locale = locale;
                println!("Month labels now use '{}'.", locale.as_str());
            }),
            "save" | "load" | "export" => match (cmd, parts.next()) {
                ("save", Some("json")) => session.save_json(&mut parts),
                ("load", Some("json")) => session.load_json(&mut parts),
                ("export", Some("csv")) => session.export_csv(&mut parts),
                _ => Err(format!("Unsupported format for '{cmd}'. Type 'help'.")),
            },
            _ => Err("Unknown command. Type 'help'.".to_string()),
        };

        if let Err(message) = result {
            println!("{message}");
        }
    }
}
