pub mod shell;

pub use shell::{prompt, prompt_password, read_line, ShellCommand};
