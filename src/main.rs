use std::io::Write;

use kolom::{DatabaseError, Record, Table, TableConfig, art::welcome_message};
use rustyline::{DefaultEditor, Result, error::ReadlineError};
use tracing_subscriber::EnvFilter;

const DEFAULT_COLUMNS: usize = 5;

fn read_multiline_command(rl: &mut DefaultEditor) -> Result<String> {
    let mut input = String::new();
    let mut prompt = "kolom> ".to_string();

    loop {
        let line = rl.readline(&prompt)?;
        let trimmed_line = line.trim_end();

        // Check if line ends with backslash (multiline continuation)
        if let Some(continued) = trimmed_line.strip_suffix('\\') {
            input.push_str(continued);
            input.push(' ');
            prompt = "    -> ".to_string();
        } else {
            input.push_str(trimmed_line);
            break;
        }
    }

    Ok(input)
}

fn parse_int(token: &str) -> std::result::Result<i64, String> {
    token
        .parse::<i64>()
        .map_err(|_| format!("not an integer: {}", token))
}

fn parse_column(token: &str) -> std::result::Result<usize, String> {
    token
        .parse::<usize>()
        .map_err(|_| format!("not a column number: {}", token))
}

fn print_record(record: &Record) {
    let values: Vec<String> = record.columns.iter().map(i64::to_string).collect();
    println!("  rid {:>6} | {}", record.rid, values.join(" | "));
}

fn find_by_key(table: &Table, key: i64) -> std::result::Result<Record, String> {
    table
        .select(table.key(), key)
        .map_err(|err| err.to_string())?
        .into_iter()
        .next()
        .ok_or_else(|| format!("no row with key {}", key))
}

fn run_command(table: &mut Table, command: &str, args: &[&str]) -> std::result::Result<(), String> {
    match command {
        "insert" => {
            let values = args
                .iter()
                .map(|arg| parse_int(arg))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let rid = table.insert(&values).map_err(|err| err.to_string())?;
            println!("inserted rid {}", rid);
        }
        "read" => {
            let key = parse_int(args.first().ok_or("usage: read <key>")?)?;
            print_record(&find_by_key(table, key)?);
        }
        "update" => {
            // update <key> <column>=<value> ...
            let key = parse_int(args.first().ok_or("usage: update <key> <col>=<value>...")?)?;
            let record = find_by_key(table, key)?;
            let mut updates = vec![None; table.num_columns()];
            for assignment in &args[1..] {
                let (column, value) = assignment
                    .split_once('=')
                    .ok_or_else(|| format!("expected <col>=<value>, got {}", assignment))?;
                let column = parse_column(column)?;
                let slot = updates
                    .get_mut(column)
                    .ok_or_else(|| format!("no column {}", column))?;
                *slot = Some(parse_int(value)?);
            }
            table
                .update(record.rid, &updates)
                .map_err(|err| err.to_string())?;
            println!("updated rid {}", record.rid);
        }
        "delete" => {
            let key = parse_int(args.first().ok_or("usage: delete <key>")?)?;
            let record = find_by_key(table, key)?;
            table.delete(record.rid).map_err(|err| err.to_string())?;
            println!("deleted rid {}", record.rid);
        }
        "locate" => {
            let [column, value] = args else {
                return Err("usage: locate <column> <value>".to_string());
            };
            let column = parse_column(column)?;
            if !table.index().is_indexed(column) {
                return Err(format!("column {} is not indexed", column));
            }
            let rids: Vec<String> = table
                .index()
                .locate(column, parse_int(value)?)
                .iter()
                .map(u64::to_string)
                .collect();
            println!("[{}]", rids.join(", "));
        }
        "range" => {
            let [begin, end] = args else {
                return Err("usage: range <begin> <end>".to_string());
            };
            let records = table
                .select_range(table.key(), parse_int(begin)?, parse_int(end)?)
                .map_err(|err| err.to_string())?;
            records.iter().for_each(print_record);
            println!("{} row(s)", records.len());
        }
        "sum" => {
            let [begin, end, column] = args else {
                return Err("usage: sum <begin> <end> <column>".to_string());
            };
            let total = table
                .sum(parse_int(begin)?, parse_int(end)?, parse_column(column)?)
                .map_err(|err| err.to_string())?;
            println!("{}", total);
        }
        "index" | "dropindex" => {
            let column = parse_column(args.first().ok_or("usage: index <column>")?)?;
            if command == "index" {
                table.create_index(column).map_err(|err| err.to_string())?;
                println!("indexed column {}", column);
            } else {
                let dropped = table.drop_index(column).map_err(|err| err.to_string())?;
                println!("{}", if dropped { "dropped" } else { "no index to drop" });
            }
        }
        "merge" => {
            for outcome in table.merge_all().map_err(|err| err.to_string())? {
                println!("{:?}", outcome);
            }
        }
        "stats" => {
            println!("{} live row(s)", table.len());
            for stats in table.range_stats() {
                println!(
                    "  range {}: {} base page(s), {} base record(s), {} tail record(s)",
                    stats.range, stats.base_pages, stats.base_records, stats.tail_records
                );
            }
        }
        "save" => {
            let path = args.first().ok_or("usage: save <path>")?;
            table.save(path).map_err(|err| err.to_string())?;
            println!("saved to {}", path);
        }
        "load" => {
            let path = args.first().ok_or("usage: load <path>")?;
            *table = Table::load(path).map_err(|err| err.to_string())?;
            println!("loaded table '{}'", table.name());
        }
        _ => return Err(format!("unknown command: {}", command)),
    }
    Ok(())
}

fn process_command(table: &mut Table, command: &str) -> bool {
    let cmd = command.trim();
    let mut parts = cmd.split_whitespace();
    let Some(head) = parts.next() else {
        return true;
    };
    let args: Vec<&str> = parts.collect();

    match head.to_lowercase().as_str() {
        "exit" | "quit" | "q" => {
            println!("Goodbye!");
            return false;
        }
        "help" | "h" => {
            println!(
                r#"
Available commands:
  insert <v0> <v1> ...         - Insert a row (column {key} is the key)
  read <key>                   - Show the row with this key
  update <key> <col>=<v> ...   - Update columns of a row
  delete <key>                 - Delete a row
  locate <col> <value>         - RIDs holding a value in an indexed column
  range <begin> <end>          - Rows with key in [begin, end]
  sum <begin> <end> <col>      - Sum a column over a key range
  index <col>, dropindex <col> - Build or drop a secondary index
  merge                        - Merge every page range
  stats                        - Page range statistics
  save <path>, load <path>     - Write or read a snapshot
  help, h                      - Show this help message
  clear                        - Clear the screen
  exit, quit, q                - Exit

Use '\' at the end of a line for multiline input.
"#,
                key = table.key()
            );
        }
        "clear" => {
            print!("\x1B[2J\x1B[1;1H");
            let _ = std::io::stdout().flush();
        }
        other => {
            if let Err(message) = run_command(table, other, &args) {
                println!("Error: {}", message);
            }
        }
    }

    true
}

fn open_table() -> std::result::Result<Table, DatabaseError> {
    match std::env::args().nth(1) {
        Some(path) => Table::load(path),
        None => Table::with_config("kolom", DEFAULT_COLUMNS, 0, TableConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    println!("{}", welcome_message("KOLOM"));

    let mut table = match open_table() {
        Ok(table) => table,
        Err(err) => {
            eprintln!("Failed to open table: {}", err);
            std::process::exit(1);
        }
    };

    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history("history.txt");

    loop {
        match read_multiline_command(&mut rl) {
            Ok(input) => {
                let command = input.trim().to_string();
                if !command.is_empty() {
                    rl.add_history_entry(&command)?;
                    if !process_command(&mut table, &command) {
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("EOF");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history("history.txt");
    Ok(())
}
