use std::{cell::Cell, panic, rc::Rc};

use rustyline::{error::ReadlineError, DefaultEditor};
use tracing::debug;

use crate::{
    diagnostics::{Result, SprigError},
    runtime::Interpreter,
    stdlib::VERSION,
    value::Value,
};

const PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = "... ";

const HELP: &str = "
Welcome to sprig!

Type (exit) or Ctrl+D or Ctrl+C to leave the REPL.
End a line with \\ to continue the expression on the next line.
Use (doc <symbol>) to read the documentation of a binding and
(dump-scope) to list everything that is bound.
";

pub struct Repl {
    interpreter: Interpreter,
    cancelled: Rc<Cell<bool>>,
}

impl Repl {
    pub fn new(interpreter: Interpreter) -> Self {
        let cancelled = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancelled);
        interpreter.bind_doc(
            "exit",
            Value::native("exit", move || flag.set(true)),
            "Ends the REPL session after the current submission.\nUsage: (exit)",
        );
        interpreter.bind_doc(
            "?",
            Value::native("?", || HELP),
            "Shows REPL help.\nUsage: (?)",
        );
        Self {
            interpreter,
            cancelled,
        }
    }

    /// Requests the session to end. Takes effect between submissions.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        println!("Welcome to sprig {VERSION}!\nType \"(?)\" for help!");
        while !self.is_cancelled() {
            let source = match read_submission(&mut editor) {
                Ok(source) => source,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            };
            if source.trim().is_empty() {
                continue;
            }
            editor.add_history_entry(source.as_str()).ok();
            println!("{}", self.submit(&source));
        }
        debug!("repl session ended");
        println!("Bye!");
        Ok(())
    }

    /// Executes one submission and renders its outcome for display.
    pub fn submit(&self, source: &str) -> String {
        match self.interpreter.execute(source) {
            Ok(value) => format_result(&value),
            Err(err) => format!("error: {err}"),
        }
    }
}

/// Reads lines until one does not end with a backslash.
fn read_submission(editor: &mut DefaultEditor) -> std::result::Result<String, ReadlineError> {
    let mut source = String::new();
    let mut prompt = PROMPT;
    loop {
        let line = editor.readline(prompt)?;
        match line.strip_suffix('\\') {
            Some(partial) => {
                source.push_str(partial);
                source.push('\n');
                prompt = CONTINUATION_PROMPT;
            }
            None => {
                source.push_str(&line);
                return Ok(source);
            }
        }
    }
}

/// Invokable values render as an opaque placeholder, everything else
/// through its textual form.
pub fn format_result(value: &Value) -> String {
    if value.is_callable() {
        "<function>".to_string()
    } else {
        value.to_string()
    }
}

/// Runs `session` with panic reports sent to the debug log instead of
/// stderr. Panics caught by `invoke` are still reported as Call failures.
pub fn with_quiet_panics<T>(session: impl FnOnce() -> T) -> T {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|info| debug!("{info}")));
    let result = session();
    panic::set_hook(previous);
    result
}

fn readline_error(err: ReadlineError) -> SprigError {
    SprigError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_cancels_between_submissions() {
        let repl = Repl::new(Interpreter::new());
        assert!(!repl.is_cancelled());
        assert_eq!(repl.submit("(do (exit) 42)"), "42");
        assert!(repl.is_cancelled());
    }

    #[test]
    fn renders_callables_as_placeholder() {
        let repl = Repl::new(Interpreter::new());
        assert_eq!(repl.submit("(lambda [x] x)"), "<function>");
        assert_eq!(repl.submit("add"), "<function>");
        assert_eq!(repl.submit("[1 \"a\" true]"), "[1 a true]");
    }

    #[test]
    fn quiet_session_still_reports_host_panics() {
        let repl = Repl::new(Interpreter::new());
        repl.interpreter.bind(
            "explode",
            Value::native("explode", || -> f64 { panic!("fuse lit") }),
        );
        let rendered = with_quiet_panics(|| repl.submit("(explode)"));
        assert!(rendered.starts_with("error: "));
        assert!(rendered.contains("fuse lit"));
        assert_eq!(repl.submit("(add 1 2)"), "3");
    }

    #[test]
    fn failures_are_reported_not_raised() {
        let repl = Repl::new(Interpreter::new());
        let rendered = repl.submit("(missing 1)");
        assert!(rendered.starts_with("error: "));
        assert!(rendered.contains("missing"));
    }
}
