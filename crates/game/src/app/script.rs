use std::fmt;

use thiserror::Error;

/// One instruction of a headless session script.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScriptCommand {
    Start,
    Wait { seconds: f32 },
    Produce { count: u32, golden: bool },
    Upgrade { skill_id: String },
    End,
    Prepare,
    Grant { amount: u64 },
    Area,
    Transition,
    Status,
    Skills,
    Save,
    Reset,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScriptLine {
    pub(crate) line_number: usize,
    pub(crate) command: ScriptCommand,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. usage: {}", self.reason, self.usage)
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("script line {line_number}: {error}")]
pub(crate) struct ScriptParseError {
    pub(crate) line_number: usize,
    pub(crate) error: CommandParseError,
}

type ParseFn = fn(&[String]) -> Result<ScriptCommand, CommandParseError>;

struct CommandSpec {
    name: &'static str,
    arg_schema: &'static str,
    help: &'static str,
    parse: ParseFn,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "start",
        arg_schema: "",
        help: "Start a round",
        parse: parse_start_command,
    },
    CommandSpec {
        name: "wait",
        arg_schema: "<seconds:f32>",
        help: "Advance simulated time",
        parse: parse_wait_command,
    },
    CommandSpec {
        name: "produce",
        arg_schema: "[count:u32] [golden]",
        help: "Lay eggs during a round",
        parse: parse_produce_command,
    },
    CommandSpec {
        name: "upgrade",
        arg_schema: "<skill_id:string>",
        help: "Buy the next level of a skill",
        parse: parse_upgrade_command,
    },
    CommandSpec {
        name: "end",
        arg_schema: "",
        help: "End the round early and bank eggs",
        parse: parse_end_command,
    },
    CommandSpec {
        name: "prepare",
        arg_schema: "",
        help: "Return to preparation",
        parse: parse_prepare_command,
    },
    CommandSpec {
        name: "grant",
        arg_schema: "<amount:u64>",
        help: "Credit banked currency",
        parse: parse_grant_command,
    },
    CommandSpec {
        name: "area",
        arg_schema: "",
        help: "Advance to the next area",
        parse: parse_area_command,
    },
    CommandSpec {
        name: "transition",
        arg_schema: "",
        help: "Mark the area transition as shown",
        parse: parse_transition_command,
    },
    CommandSpec {
        name: "status",
        arg_schema: "",
        help: "Log economy and round state",
        parse: parse_status_command,
    },
    CommandSpec {
        name: "skills",
        arg_schema: "",
        help: "Log every skill with its level and status",
        parse: parse_skills_command,
    },
    CommandSpec {
        name: "save",
        arg_schema: "",
        help: "Flush any pending save",
        parse: parse_save_command,
    },
    CommandSpec {
        name: "reset",
        arg_schema: "",
        help: "Delete the save and start over",
        parse: parse_reset_command,
    },
    CommandSpec {
        name: "quit",
        arg_schema: "",
        help: "Stop the script",
        parse: parse_quit_command,
    },
];

/// `name args - help` lines in table order.
pub(crate) fn help_lines() -> Vec<String> {
    COMMANDS
        .iter()
        .map(|spec| {
            if spec.arg_schema.is_empty() {
                format!("{} - {}", spec.name, spec.help)
            } else {
                format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
            }
        })
        .collect()
}

/// Parses a whole script. Blank lines and `#` comments are skipped; the first
/// bad line fails the script.
pub(crate) fn parse_script(raw: &str) -> Result<Vec<ScriptLine>, ScriptParseError> {
    let mut lines = Vec::new();
    for (index, raw_line) in raw.lines().enumerate() {
        let line_number = index + 1;
        match parse_line(raw_line) {
            Ok(Some(command)) => lines.push(ScriptLine {
                line_number,
                command,
            }),
            Ok(None) => {}
            Err(error) => return Err(ScriptParseError { line_number, error }),
        }
    }
    Ok(lines)
}

fn parse_line(raw_line: &str) -> Result<Option<ScriptCommand>, CommandParseError> {
    let trimmed = raw_line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let tokens = tokenize_line(trimmed).map_err(|reason| CommandParseError {
        reason,
        usage: "<command> [args...]".to_string(),
    })?;
    let Some((command_name, args)) = tokens.split_first() else {
        return Ok(None);
    };

    let lower = command_name.to_ascii_lowercase();
    let Some(spec) = COMMANDS.iter().find(|spec| spec.name == lower) else {
        return Err(CommandParseError {
            reason: format!("unknown command '{command_name}'"),
            usage: COMMANDS
                .iter()
                .map(|spec| spec.name)
                .collect::<Vec<_>>()
                .join("|"),
        });
    };

    (spec.parse)(args).map(Some)
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if seen_token_content {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_start_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "start")?;
    Ok(ScriptCommand::Start)
}

fn parse_wait_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "wait <seconds>";
    let [raw] = args else {
        return Err(CommandParseError {
            reason: "expected exactly one argument <seconds>".to_string(),
            usage: USAGE.to_string(),
        });
    };
    let seconds = raw
        .parse::<f32>()
        .ok()
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .ok_or_else(|| CommandParseError {
            reason: format!("invalid duration '{raw}' (expected positive f32)"),
            usage: USAGE.to_string(),
        })?;
    Ok(ScriptCommand::Wait { seconds })
}

fn parse_produce_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "produce [count] [golden]";
    if args.len() > 2 {
        return Err(CommandParseError {
            reason: "expected at most two arguments".to_string(),
            usage: USAGE.to_string(),
        });
    }

    let mut count = 1;
    let mut golden = false;
    for arg in args {
        if arg.eq_ignore_ascii_case("golden") {
            golden = true;
            continue;
        }
        count = arg
            .parse::<u32>()
            .ok()
            .filter(|count| *count > 0)
            .ok_or_else(|| CommandParseError {
                reason: format!("invalid count '{arg}' (expected u32 > 0 or 'golden')"),
                usage: USAGE.to_string(),
            })?;
    }
    Ok(ScriptCommand::Produce { count, golden })
}

fn parse_upgrade_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    let [skill_id] = args else {
        return Err(CommandParseError {
            reason: "expected exactly one argument <skill_id>".to_string(),
            usage: "upgrade <skill_id>".to_string(),
        });
    };
    Ok(ScriptCommand::Upgrade {
        skill_id: skill_id.clone(),
    })
}

fn parse_end_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "end")?;
    Ok(ScriptCommand::End)
}

fn parse_prepare_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "prepare")?;
    Ok(ScriptCommand::Prepare)
}

fn parse_grant_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "grant <amount>";
    let [raw] = args else {
        return Err(CommandParseError {
            reason: "expected exactly one argument <amount>".to_string(),
            usage: USAGE.to_string(),
        });
    };
    let amount = raw.parse::<u64>().map_err(|_| CommandParseError {
        reason: format!("invalid amount '{raw}' (expected u64)"),
        usage: USAGE.to_string(),
    })?;
    Ok(ScriptCommand::Grant { amount })
}

fn parse_area_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "area")?;
    Ok(ScriptCommand::Area)
}

fn parse_transition_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "transition")?;
    Ok(ScriptCommand::Transition)
}

fn parse_status_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "status")?;
    Ok(ScriptCommand::Status)
}

fn parse_skills_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "skills")?;
    Ok(ScriptCommand::Skills)
}

fn parse_save_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "save")?;
    Ok(ScriptCommand::Save)
}

fn parse_reset_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "reset")?;
    Ok(ScriptCommand::Reset)
}

fn parse_quit_command(args: &[String]) -> Result<ScriptCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ScriptCommand::Quit)
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError {
            reason: "unexpected extra arguments".to_string(),
            usage: usage.to_string(),
        })
    }
}
