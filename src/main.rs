use clap::Parser;
use color_eyre::Result;
use datask::{chart, export, observer};
use datask::{Args, ExportFormat, LoadOptions, QueryOutcome, Session, TracingObserver};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    observer::init_logging(args.log_file.clone(), args.verbose)?;

    let options = LoadOptions {
        delimiter: args.delimiter,
        has_header: !args.no_header,
        sheet: args.sheet.clone(),
    };
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    let mut session = Session::with_observer(Box::new(TracingObserver));
    session.load(&args.path, &options)?;
    if let Some(df) = session.view() {
        println!(
            "Loaded {} ({} rows x {} columns)",
            args.path.display(),
            df.height(),
            df.width()
        );
    }

    if let Some(query) = &args.query {
        run_query(&mut session, query, &output_dir);
        return Ok(());
    }

    repl(&mut session, &output_dir)
}

const HELP: &str = "\
Enter a query like 'plot with Column1 and Column2', 'average of Column1',
'count where Column1=value and Column2=value', or 'when Column1'.
Commands:
  :filter <column> <greater|less|equal|contains> <value>
  :sort <column> [desc]
  :clear               clear filters
  :history             show query history
  :profile             show the loaded file's profile
  :export <csv|json|html> [path]
  :help                show this help
  :quit                exit";

fn repl(session: &mut Session, output_dir: &Path) -> Result<()> {
    println!("{}", HELP);
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_whitespace().next() {
            Some(":quit") | Some(":q") => break,
            Some(":help") => println!("{}", HELP),
            Some(":history") => {
                if session.history().is_empty() {
                    println!("No queries in history.");
                } else {
                    for (i, query) in session.history().entries().enumerate() {
                        println!("{}. {}", i + 1, query);
                    }
                }
            }
            Some(":profile") => print_profile(session),
            Some(":clear") => match session.clear_filters() {
                Ok(df) => println!("{}", df),
                Err(e) => eprintln!("error: {e}"),
            },
            Some(":filter") => run_filter(session, line),
            Some(":sort") => run_sort(session, line),
            Some(":export") => run_export(session, line, output_dir),
            _ => run_query(session, line, output_dir),
        }
    }
    Ok(())
}

fn run_query(session: &mut Session, query: &str, output_dir: &Path) {
    match session.run_query(query) {
        Ok(QueryOutcome::Plot(spec)) => {
            let path = output_dir.join("plot_output.png");
            let Some(df) = session.view() else {
                eprintln!("error: no data loaded");
                return;
            };
            match chart::render_png(df, &spec, &path, (800, 600)) {
                Ok(()) => println!("Chart written to {}", path.display()),
                Err(e) => eprintln!("error: {e}"),
            }
        }
        Ok(QueryOutcome::Average { column, value }) => {
            println!("The average of {} is: {:.2}", column, value);
        }
        Ok(QueryOutcome::Count { matches, .. }) => {
            println!("Number of matching rows: {}", matches);
        }
        Ok(QueryOutcome::When { table, .. }) => println!("{}", table),
        Ok(QueryOutcome::Unknown) => {
            println!("Unknown query type. Try asking for plot, average, count, or dates.");
        }
        Err(e) => eprintln!("error: {e}"),
    }
}

fn print_profile(session: &Session) {
    let Some(file_name) = session.file_name() else {
        eprintln!("error: no data loaded");
        return;
    };
    match session.profile(file_name) {
        Some(profile) => match serde_json::to_string_pretty(profile) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("error: {e}"),
        },
        None => eprintln!("error: no profile for {}", file_name),
    }
}

fn run_filter(session: &mut Session, line: &str) {
    let parts: Vec<&str> = line.splitn(4, char::is_whitespace).collect();
    if parts.len() < 4 {
        eprintln!("usage: :filter <column> <greater|less|equal|contains> <value>");
        return;
    }
    match session.apply_filter(parts[1], parts[2], parts[3].trim()) {
        Ok(df) => println!("{}", df),
        Err(e) => eprintln!("error: {e}"),
    }
}

fn run_sort(session: &mut Session, line: &str) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        eprintln!("usage: :sort <column> [desc]");
        return;
    }
    let ascending = parts.get(2).map(|p| !p.eq_ignore_ascii_case("desc")).unwrap_or(true);
    match session.sort_by(parts[1], ascending) {
        Ok(df) => println!("{}", df),
        Err(e) => eprintln!("error: {e}"),
    }
}

fn run_export(session: &mut Session, line: &str, output_dir: &Path) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        eprintln!("usage: :export <csv|json|html> [path]");
        return;
    }
    let format = match parts[1].parse::<ExportFormat>() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("error: {e}");
            return;
        }
    };
    let path = parts
        .get(2)
        .map(|p| PathBuf::from(*p))
        .unwrap_or_else(|| output_dir.join(format.default_file_name()));
    let Some(df) = session.view() else {
        eprintln!("error: no data loaded");
        return;
    };
    let chart_artifact = output_dir.join("plot_output.png");
    let chart = chart_artifact.exists().then_some(chart_artifact.as_path());
    match export::export(df, format, &path, chart) {
        Ok(written) => println!("Exported to {}", written.display()),
        Err(e) => eprintln!("error: {e}"),
    }
}
