//! Visitor-based command-line configuration.
//!
//! A configuration struct lists its fields once in [`Args::for_each`]; the
//! same listing drives default initialization, `--help` output, printing the
//! effective values and parsing `--name value` pairs.

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("--{name}: cannot parse {value:?} as {expected}")]
    BadValue {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("--{0}: missing value")]
    MissingValue(String),

    #[error("unknown flag {0}")]
    UnknownFlag(String),
}

pub type Result<T> = std::result::Result<T, ArgsError>;

pub trait Args: Sized {
    fn for_each<V: ArgVisitor>(&mut self, visitor: &mut V);

    fn init(&mut self) {
        self.for_each(&mut InitVisitor);
    }

    fn help(&mut self) {
        self.for_each(&mut HelpVisitor);
    }

    fn print(&mut self, verbosity: i32) {
        self.for_each(&mut PrintVisitor { verbosity });
    }

    /// Parses `--name value` pairs. Flags no field claims are rejected.
    fn parse(&mut self, args: &[String]) -> Result<()> {
        let mut visitor = ParseVisitor {
            args,
            claimed: vec![false; args.len()],
            error: None,
        };
        self.for_each(&mut visitor);
        if let Some(err) = visitor.error {
            return Err(err);
        }
        for (arg, claimed) in args.iter().zip(&visitor.claimed) {
            if arg.starts_with("--") && !claimed {
                return Err(ArgsError::UnknownFlag(arg.clone()));
            }
        }
        Ok(())
    }

    fn init_and_parse(&mut self, args: &[String]) -> Result<()> {
        self.init();
        self.parse(args)
    }
}

pub trait ArgVisitor {
    fn visit_usize(&mut self, value: &mut usize, name: &str, init: usize, help: &str, verbosity: i32);
    fn visit_i32(&mut self, value: &mut i32, name: &str, init: i32, help: &str, verbosity: i32);
    fn visit_bool(&mut self, value: &mut bool, name: &str, init: bool, help: &str, verbosity: i32);
    fn visit_string(&mut self, value: &mut String, name: &str, init: &str, help: &str, verbosity: i32);
}

struct InitVisitor;

impl ArgVisitor for InitVisitor {
    fn visit_usize(&mut self, value: &mut usize, _name: &str, init: usize, _help: &str, _v: i32) {
        *value = init;
    }
    fn visit_i32(&mut self, value: &mut i32, _name: &str, init: i32, _help: &str, _v: i32) {
        *value = init;
    }
    fn visit_bool(&mut self, value: &mut bool, _name: &str, init: bool, _help: &str, _v: i32) {
        *value = init;
    }
    fn visit_string(&mut self, value: &mut String, _name: &str, init: &str, _help: &str, _v: i32) {
        *value = init.to_string();
    }
}

struct HelpVisitor;

impl HelpVisitor {
    fn line(name: &str, init: &dyn core::fmt::Display, help: &str) {
        eprintln!("  --{:<14} {} (default: {})", name, help, init);
    }
}

impl ArgVisitor for HelpVisitor {
    fn visit_usize(&mut self, _value: &mut usize, name: &str, init: usize, help: &str, _v: i32) {
        Self::line(name, &init, help);
    }
    fn visit_i32(&mut self, _value: &mut i32, name: &str, init: i32, help: &str, _v: i32) {
        Self::line(name, &init, help);
    }
    fn visit_bool(&mut self, _value: &mut bool, name: &str, init: bool, help: &str, _v: i32) {
        Self::line(name, &init, help);
    }
    fn visit_string(&mut self, _value: &mut String, name: &str, init: &str, help: &str, _v: i32) {
        Self::line(name, &init, help);
    }
}

struct PrintVisitor {
    verbosity: i32,
}

impl PrintVisitor {
    fn line(&self, name: &str, value: &dyn core::fmt::Display, verbosity: i32) {
        if self.verbosity >= verbosity {
            eprintln!("{:<20}: {}", name, value);
        }
    }
}

impl ArgVisitor for PrintVisitor {
    fn visit_usize(&mut self, value: &mut usize, name: &str, _init: usize, _help: &str, v: i32) {
        self.line(name, value, v);
    }
    fn visit_i32(&mut self, value: &mut i32, name: &str, _init: i32, _help: &str, v: i32) {
        self.line(name, value, v);
    }
    fn visit_bool(&mut self, value: &mut bool, name: &str, _init: bool, _help: &str, v: i32) {
        self.line(name, value, v);
    }
    fn visit_string(&mut self, value: &mut String, name: &str, _init: &str, _help: &str, v: i32) {
        self.line(name, value, v);
    }
}

struct ParseVisitor<'a> {
    args: &'a [String],
    claimed: Vec<bool>,
    error: Option<ArgsError>,
}

impl<'a> ParseVisitor<'a> {
    /// Returns the value following `--name`, marking both tokens as claimed.
    fn find_value(&mut self, name: &str) -> Option<&'a str> {
        let args = self.args;
        let prefixed = format!("--{}", name);
        let pos = args.iter().position(|a| *a == prefixed)?;
        self.claimed[pos] = true;
        match args.get(pos + 1) {
            Some(v) => {
                self.claimed[pos + 1] = true;
                Some(v.as_str())
            }
            None => {
                self.fail(ArgsError::MissingValue(name.to_string()));
                None
            }
        }
    }

    fn fail(&mut self, err: ArgsError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn parse_into<T: core::str::FromStr>(&mut self, value: &mut T, name: &str, expected: &'static str) {
        if let Some(v) = self.find_value(name) {
            match v.parse() {
                Ok(parsed) => *value = parsed,
                Err(_) => self.fail(ArgsError::BadValue {
                    name: name.to_string(),
                    value: v.to_string(),
                    expected,
                }),
            }
        }
    }
}

impl<'a> ArgVisitor for ParseVisitor<'a> {
    fn visit_usize(&mut self, value: &mut usize, name: &str, _init: usize, _help: &str, _v: i32) {
        self.parse_into(value, name, "an unsigned integer");
    }
    fn visit_i32(&mut self, value: &mut i32, name: &str, _init: i32, _help: &str, _v: i32) {
        self.parse_into(value, name, "an integer");
    }
    fn visit_bool(&mut self, value: &mut bool, name: &str, _init: bool, _help: &str, _v: i32) {
        if let Some(v) = self.find_value(name) {
            match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => *value = true,
                "false" | "0" | "off" => *value = false,
                _ => self.fail(ArgsError::BadValue {
                    name: name.to_string(),
                    value: v.to_string(),
                    expected: "a boolean",
                }),
            }
        }
    }
    fn visit_string(&mut self, value: &mut String, name: &str, _init: &str, _help: &str, _v: i32) {
        if let Some(v) = self.find_value(name) {
            *value = v.to_string();
        }
    }
}

pub fn has_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help" || a == "-h")
}
