use anyhow::Result;
use bi_query_builder::ast::{AggregateFunc, Operator};
use bi_query_builder::catalog::{Catalog, Dataset};
use bi_query_builder::config::load_catalog;
use bi_query_builder::executor::Executor;
use bi_query_builder::model::Filter;
use bi_query_builder::saved::SavedQueries;
use bi_query_builder::session::{Action, BuilderState};
use bi_query_builder::value::Row;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};

const CATALOG_FILE: &str = "catalog.json";

const HELP: &str = "\
Any other input replaces the query text and runs it.

  :tables                       list tables with their metrics and dimensions
  :table <name>                 switch table (clears the selection)
  :agg <func>                   aggregation for metrics (sum, avg, count, min, max)
  :metric <field>               toggle a metric
  :dim <field>                  toggle a dimension
  :filter <field> <op> <value>  add a filter (=, >, <, >=, <=, like)
  :clear                        remove all filters
  :show                         print the current query
  :exec                         run the current query
  :page <n>                     show page n of the last result
  :save                         save the current query
  :saved                        list saved queries
  :run <id>                     load and run a saved query
  :delete <id>                  delete a saved query
  :help                         this text
  :quit                         exit";

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

/// 优先从 `catalog.json` 加载目录，文件缺失或无效时使用内置目录
fn load_catalog_or_builtin() -> Catalog {
    match load_catalog(CATALOG_FILE) {
        Ok(catalog) => {
            info!(file = CATALOG_FILE, tables = catalog.tables.len(), "loaded catalog");
            catalog
        }
        Err(e) => {
            warn!("{}, using the built-in catalog", e);
            Catalog::builtin()
        }
    }
}

struct Repl {
    catalog: Catalog,
    dataset: Dataset,
    executor: Executor,
    state: BuilderState,
    saved: SavedQueries,
}

enum Flow {
    Continue,
    Quit,
}

impl Repl {
    fn new(catalog: Catalog) -> Self {
        let executor = catalog.build_executor();
        Self {
            dataset: catalog.dataset(),
            catalog,
            executor,
            state: BuilderState::new(),
            saved: SavedQueries::new(),
        }
    }

    fn apply(&mut self, action: Action) {
        self.state.apply(action, &self.dataset, &self.executor);
    }

    fn handle(&mut self, line: &str) -> Flow {
        let Some(command) = line.strip_prefix(':') else {
            self.apply(Action::EditQuery(line.to_string()));
            self.run_current();
            return Flow::Continue;
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name {
            "quit" | "q" | "exit" => return Flow::Quit,
            "help" => println!("{}", HELP),
            "tables" => self.print_tables(),
            "table" => {
                if self.catalog.table(arg).is_some() {
                    self.apply(Action::SelectTable(arg.to_string()));
                    println!("{}", self.state.query);
                } else {
                    println!("unknown table: {}", arg);
                }
            }
            "agg" => {
                self.apply(Action::SelectAggregation(AggregateFunc::from_name(arg)));
                println!("{}", self.state.query);
            }
            "metric" => self.toggle_metric(arg),
            "dim" => self.toggle_dimension(arg),
            "filter" => match parse_filter(arg) {
                Some(filter) => {
                    self.apply(Action::AddFilter(filter));
                    println!("{}", self.state.query);
                }
                None => println!("usage: :filter <field> <op> <value>"),
            },
            "clear" => {
                self.apply(Action::ClearFilters);
                println!("{}", self.state.query);
            }
            "show" => println!("{}", self.state.query),
            "exec" => self.run_current(),
            "page" => match arg.parse::<usize>() {
                Ok(page) => {
                    self.apply(Action::SetPage(page));
                    self.print_page();
                }
                Err(_) => println!("usage: :page <n>"),
            },
            "save" => match self.state.save() {
                Some(record) => {
                    let id = record.id;
                    if self.saved.save(record) {
                        println!("saved as {}", id);
                    } else {
                        println!("already saved");
                    }
                }
                None => println!("nothing to save"),
            },
            "saved" => {
                if self.saved.is_empty() {
                    println!("no saved queries");
                }
                for record in self.saved.iter() {
                    println!("{}  {}  {}", record.id, record.timestamp, record.query);
                }
            }
            "run" => match arg.parse::<i64>().ok().and_then(|id| self.saved.get(id)).cloned() {
                Some(record) => {
                    self.apply(Action::LoadSaved(record));
                    self.run_current();
                }
                None => println!("no saved query with id {}", arg),
            },
            "delete" => match arg.parse::<i64>().ok().and_then(|id| self.saved.remove(id)) {
                Some(record) => println!("deleted {}", record.id),
                None => println!("no saved query with id {}", arg),
            },
            _ => println!("unknown command :{} (try :help)", name),
        }
        Flow::Continue
    }

    fn toggle_metric(&mut self, field: &str) {
        let metric = self
            .catalog
            .table(&self.state.table)
            .and_then(|t| t.metrics.iter().find(|m| m.value.eq_ignore_ascii_case(field)))
            .cloned();
        match metric {
            Some(metric) => {
                self.apply(Action::ToggleMetric(metric));
                println!("{}", self.state.query);
            }
            None => println!("{} has no metric {}", self.state.table, field),
        }
    }

    fn toggle_dimension(&mut self, field: &str) {
        let dimension = self
            .catalog
            .table(&self.state.table)
            .and_then(|t| t.dimensions.iter().find(|d| d.value.eq_ignore_ascii_case(field)))
            .cloned();
        match dimension {
            Some(dimension) => {
                self.apply(Action::ToggleDimension(dimension));
                println!("{}", self.state.query);
            }
            None => println!("{} has no dimension {}", self.state.table, field),
        }
    }

    fn run_current(&mut self) {
        self.apply(Action::Execute);
        self.print_page();
    }

    fn print_tables(&self) {
        for table in &self.catalog.tables {
            let metrics: Vec<_> = table.metrics.iter().map(|m| m.value.as_str()).collect();
            let dimensions: Vec<_> = table.dimensions.iter().map(|d| d.value.as_str()).collect();
            println!("{} ({} rows)", table.name, table.rows.len());
            println!("  metrics:    {}", metrics.join(", "));
            println!("  dimensions: {}", dimensions.join(", "));
        }
    }

    fn print_page(&self) {
        let rows = self.state.page_rows();
        if rows.is_empty() {
            println!("(no rows)");
            return;
        }
        let columns = columns(rows);
        println!("{}", columns.join("\t"));
        for row in rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|c| row.get(*c).map(ToString::to_string).unwrap_or_default())
                .collect();
            println!("{}", cells.join("\t"));
        }
        println!(
            "page {}/{} ({} rows)",
            self.state.page,
            self.state.total_pages(),
            self.state.results.len()
        );
    }
}

/// 展示用的列顺序：`id` 在前，其余按字典序
fn columns(rows: &[Row]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }
    columns.sort_by_key(|c| (*c != "id", *c));
    columns
}

fn parse_filter(arg: &str) -> Option<Filter> {
    let mut parts = arg.splitn(3, char::is_whitespace);
    let field = parts.next().filter(|f| !f.is_empty())?;
    let operator = match parts.next()?.to_ascii_lowercase().as_str() {
        "=" => Operator::Eq,
        ">" => Operator::Gt,
        "<" => Operator::Lt,
        ">=" => Operator::Gte,
        "<=" => Operator::Lte,
        "like" => Operator::Like,
        _ => return None,
    };
    let value = parts.next().unwrap_or("").trim();
    Some(Filter::new(field, operator, value))
}

fn main() -> Result<()> {
    init_logging();

    let mut repl = Repl::new(load_catalog_or_builtin());
    let mut editor = DefaultEditor::new()?;

    println!("BI query builder. Type :help for commands.");
    loop {
        match editor.readline("bi> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                if let Flow::Quit = repl.handle(line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
