//! Containerfile instructions

use serde::Serialize;

/// A single Containerfile instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Instruction {
    From(String),
    Env(Vec<(String, String)>),
    Workdir(String),
    Copy { src: String, dest: String },
    Run(String),
    Expose(u16),
    Cmd(Vec<String>),
}

impl Instruction {
    /// Render as one Containerfile line
    pub fn render(&self) -> String {
        match self {
            Instruction::From(image) => format!("FROM {}", image),
            Instruction::Env(vars) => {
                let pairs: Vec<String> = vars
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, dockerfile_quote(v)))
                    .collect();
                format!("ENV {}", pairs.join(" "))
            }
            Instruction::Workdir(dir) => format!("WORKDIR {}", dir),
            Instruction::Copy { src, dest } => format!("COPY {} {}", src, dest),
            Instruction::Run(cmd) => format!("RUN {}", cmd),
            Instruction::Expose(port) => format!("EXPOSE {}/tcp", port),
            Instruction::Cmd(argv) => {
                // Exec form; a JSON array of strings is exactly its syntax
                let json = serde_json::to_string(argv)
                    .unwrap_or_else(|_| String::from("[]"));
                format!("CMD {}", json)
            }
        }
    }
}

/// Quote a value for Containerfile ENV instruction.
/// Values containing $ (variable references) must be quoted properly.
/// Embedded double quotes and backslashes are escaped to prevent injection.
pub fn dockerfile_quote(value: &str) -> String {
    if value.is_empty()
        || value.contains('$')
        || value.contains(' ')
        || value.contains('"')
        || value.contains('\\')
    {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_cmd_exec_form() {
        let cmd = Instruction::Cmd(vec![
            "uvicorn".into(),
            "main:app".into(),
            "--host".into(),
            "0.0.0.0".into(),
            "--port".into(),
            "8000".into(),
        ]);
        assert_eq!(
            cmd.render(),
            r#"CMD ["uvicorn","main:app","--host","0.0.0.0","--port","8000"]"#
        );
    }

    #[test]
    fn render_simple_instructions() {
        assert_eq!(Instruction::Expose(8000).render(), "EXPOSE 8000/tcp");
        assert_eq!(Instruction::Workdir("/app".into()).render(), "WORKDIR /app");
        assert_eq!(
            Instruction::Copy {
                src: "src/".into(),
                dest: "./".into()
            }
            .render(),
            "COPY src/ ./"
        );
        assert_eq!(
            Instruction::Env(vec![
                ("A".into(), "1".into()),
                ("B".into(), "two words".into())
            ])
            .render(),
            "ENV A=1 B=\"two words\""
        );
    }

    #[test]
    fn dockerfile_quote_simple() {
        assert_eq!(dockerfile_quote("/usr/local/bin"), "/usr/local/bin");
        assert_eq!(dockerfile_quote(""), "\"\"");
    }

    #[test]
    fn dockerfile_quote_with_variable() {
        assert_eq!(
            dockerfile_quote("/opt/venv/bin:${PATH}"),
            "\"/opt/venv/bin:${PATH}\""
        );
    }

    #[test]
    fn dockerfile_quote_escapes_embedded_quotes_and_backslashes() {
        assert_eq!(
            dockerfile_quote("value with \"quotes\""),
            "\"value with \\\"quotes\\\"\""
        );
        assert_eq!(dockerfile_quote("a\\b"), "\"a\\\\b\"");
    }
}
