use std::path::PathBuf;

use crate::capture::Region;
use crate::selection::SelectionMode;

pub const HELP: &str = "\
commands:
  start | stop | status | history | test | help | quit
  interval <seconds>            time between samples (>= 0.1)
  window <minutes>              amortized-rate window (>= 0.5)
  target <gold|none>            upgrade cost for the time-to-target estimate
  area <x1> <y1> <x2> <y2>      OCR region (absolute screen coordinates)
  parent <x1> <y1> <x2> <y2>    capture region for two-step mode
  two-step <on|off>
  select                        begin region selection
  mode <window|full|manual>     selection step 1
  pick <x1> <y1> <x2> <y2>      pick the current selection area
  preview <file.png>            save a scaled preview of the parent for step 2
  pick-preview <x1> <y1> <x2> <y2>
                                pick the OCR area in preview pixels
  entire                        use the whole parent as the OCR region
  cancel                        abandon region selection";

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardCommand {
    Start,
    Stop,
    Status,
    History,
    Test,
    Help,
    Quit,
    Interval(f64),
    Window(f64),
    Target(Option<f64>),
    Area(Region),
    Parent(Region),
    TwoStep(bool),
    Select,
    Mode(SelectionMode),
    Pick(Region),
    Preview(PathBuf),
    PickPreview(Region),
    Entire,
    Cancel,
}

pub fn parse_command(line: &str) -> Result<DashboardCommand, String> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Err("empty command".into());
    };
    let args: Vec<&str> = words.collect();

    let command = match name.to_ascii_lowercase().as_str() {
        "start" => DashboardCommand::Start,
        "stop" => DashboardCommand::Stop,
        "status" => DashboardCommand::Status,
        "history" => DashboardCommand::History,
        "test" => DashboardCommand::Test,
        "help" | "?" => DashboardCommand::Help,
        "quit" | "exit" => DashboardCommand::Quit,
        "select" => DashboardCommand::Select,
        "entire" => DashboardCommand::Entire,
        "cancel" => DashboardCommand::Cancel,
        "interval" => DashboardCommand::Interval(single_number(&args)?),
        "window" => DashboardCommand::Window(single_number(&args)?),
        "target" => match args.as_slice() {
            [value] if value.eq_ignore_ascii_case("none") => DashboardCommand::Target(None),
            _ => DashboardCommand::Target(Some(single_number(&args)?)),
        },
        "area" => DashboardCommand::Area(region(&args)?),
        "parent" => DashboardCommand::Parent(region(&args)?),
        "pick" => DashboardCommand::Pick(region(&args)?),
        "pick-preview" => DashboardCommand::PickPreview(region(&args)?),
        "preview" => match args.as_slice() {
            [path] => DashboardCommand::Preview(PathBuf::from(path)),
            _ => return Err("usage: preview <file.png>".into()),
        },
        "two-step" => match args.as_slice() {
            ["on"] => DashboardCommand::TwoStep(true),
            ["off"] => DashboardCommand::TwoStep(false),
            _ => return Err("usage: two-step <on|off>".into()),
        },
        "mode" => match args.as_slice() {
            ["window"] => DashboardCommand::Mode(SelectionMode::Window),
            ["full"] => DashboardCommand::Mode(SelectionMode::FullScreen),
            ["manual"] => DashboardCommand::Mode(SelectionMode::Manual),
            _ => return Err("usage: mode <window|full|manual>".into()),
        },
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };

    Ok(command)
}

fn single_number(args: &[&str]) -> Result<f64, String> {
    match args {
        [value] => value
            .parse::<f64>()
            .map_err(|_| "Please enter a valid number".to_string()),
        _ => Err("expected exactly one number".into()),
    }
}

fn region(args: &[&str]) -> Result<Region, String> {
    let coords = args
        .iter()
        .map(|value| value.parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| "coordinates must be whole numbers".to_string())?;

    match coords.as_slice() {
        [x1, y1, x2, y2] => Ok(Region::new(*x1, *y1, *x2, *y2)),
        _ => Err("expected four coordinates: x1 y1 x2 y2".into()),
    }
}
