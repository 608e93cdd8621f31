use std::process::{Command, Stdio};

use log::debug;
use url::Url;

use crate::config::AudioPlayerCommand;
use crate::media::{AudioPlayer, PlaybackError};

const URL_PLACEHOLDER: &str = "{url}";

/// Plays audio cues by spawning an external player (ffplay by default).
/// The child is not waited on.
pub struct CommandAudioPlayer {
    command: AudioPlayerCommand,
}

impl CommandAudioPlayer {
    pub fn new(command: AudioPlayerCommand) -> Self {
        Self { command }
    }

    fn args_for(&self, url: &Url) -> Vec<String> {
        let mut args: Vec<String> = self
            .command
            .args
            .iter()
            .map(|arg| arg.replace(URL_PLACEHOLDER, url.as_str()))
            .collect();
        if !self.command.args.iter().any(|arg| arg.contains(URL_PLACEHOLDER)) {
            args.push(url.to_string());
        }
        args
    }
}

impl AudioPlayer for CommandAudioPlayer {
    fn play(&self, url: &Url) -> Result<(), PlaybackError> {
        let args = self.args_for(url);
        debug!("Spawning {} {:?}", self.command.program, args);
        Command::new(&self.command.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|err| PlaybackError(format!("{}: {err}", self.command.program)))
    }
}
