use std::io::ErrorKind;

use dialoguer::{Input, Password, Select};

use termail_core::{CachedMessage, Chooser, TermailError};

/// An interrupted prompt (ctrl-c) is a cancellation, not a fault.
fn prompt_error(err: dialoguer::Error) -> TermailError {
    match err {
        dialoguer::Error::IO(io) if io.kind() == ErrorKind::Interrupted => {
            TermailError::Cancelled
        }
        dialoguer::Error::IO(io) => TermailError::Io(io),
    }
}

/// Lets the user pick one message from a terminal selection list.
pub(crate) struct SelectChooser;

impl Chooser for SelectChooser {
    fn choose(&self, candidates: &[CachedMessage]) -> termail_core::Result<Option<usize>> {
        let items: Vec<String> = candidates
            .iter()
            .map(|m| format!("{}  ({}, {})", m.subject, m.from, m.config_name))
            .collect();
        Select::new()
            .with_prompt("Select the message")
            .items(&items)
            .default(0)
            .interact_opt()
            .map_err(prompt_error)
    }
}

pub(crate) fn password(confirm: bool) -> termail_core::Result<String> {
    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Repeat password", "Passwords do not match");
    }
    prompt.interact().map_err(prompt_error)
}

pub(crate) fn text(label: &str) -> termail_core::Result<String> {
    Input::<String>::new()
        .with_prompt(label)
        .interact_text()
        .map_err(prompt_error)
}
