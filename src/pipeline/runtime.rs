//! Runtime declaration: listening port and start command

use crate::error::{SlipwayError, SlipwayResult};
use crate::pipeline::instruction::Instruction;
use serde::Serialize;

/// Port, command and arguments the image starts with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeDeclaration {
    pub port: u16,
    pub command: String,
    pub args: Vec<String>,
}

impl RuntimeDeclaration {
    /// Validate a declaration.
    ///
    /// A `--port` argument must agree with the declared port, since the
    /// declared port is only advertised and the process has to bind it.
    pub fn new(port: u16, command: &str, args: &[String]) -> SlipwayResult<Self> {
        if port == 0 {
            return Err(SlipwayError::RuntimeInvalid(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        let command = command.trim();
        if command.is_empty() {
            return Err(SlipwayError::RuntimeInvalid(
                "start command is empty".to_string(),
            ));
        }

        if let Some(args_port) = port_argument(args)? {
            if args_port != port {
                return Err(SlipwayError::RuntimeMismatch {
                    declared: port,
                    args_port,
                });
            }
        }

        Ok(Self {
            port,
            command: command.to_string(),
            args: args.to_vec(),
        })
    }

    /// Full argv: command followed by arguments
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.command.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// `EXPOSE` and exec-form `CMD`
    pub fn instructions(&self) -> Vec<Instruction> {
        vec![Instruction::Expose(self.port), Instruction::Cmd(self.argv())]
    }
}

/// Value of `--port N` / `--port=N`, if present
fn port_argument(args: &[String]) -> SlipwayResult<Option<u16>> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let value = if arg == "--port" {
            match iter.next() {
                Some(value) => value.as_str(),
                None => {
                    return Err(SlipwayError::RuntimeInvalid(
                        "--port is missing its value".to_string(),
                    ))
                }
            }
        } else if let Some(value) = arg.strip_prefix("--port=") {
            value
        } else {
            continue;
        };

        return value.parse::<u16>().map(Some).map_err(|_| {
            SlipwayError::RuntimeInvalid(format!("--port value '{}' is not a port", value))
        });
    }
    Ok(None)
}
