//! Command-line arguments for the `bookshelf` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use bookshelf_core::config::Environment;
use bookshelf_core::protocol::{
    BackgroundUpdate, ExperienceLevel, SignUpRequest, TechnicalBackground,
};

/// bookshelf - companion client for the robotics textbook backend
#[derive(Parser, Debug)]
#[command(name = "bookshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding `config/client.toml` (default: current directory)
    #[arg(long, value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Backend to talk to, overriding the config file
    #[arg(long, value_name = "ENV", global = true)]
    pub env: Option<Environment>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[command(flatten)]
        background: BackgroundArgs,
    },

    /// Sign in with an existing account
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Update the background questionnaire
    Background {
        #[command(flatten)]
        background: BackgroundArgs,
    },

    /// Ask the book a question
    Chat {
        /// The question
        query: String,

        /// Text highlighted in the reader, sent along as context
        #[arg(long, value_name = "TEXT")]
        selection: Option<String>,
    },

    /// Search the book for matching passages
    Search {
        query: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct BackgroundArgs {
    /// beginner, intermediate or advanced
    #[arg(long, value_name = "LEVEL")]
    pub software_experience: Option<ExperienceLevel>,

    /// beginner, intermediate or advanced
    #[arg(long, value_name = "LEVEL")]
    pub hardware_experience: Option<ExperienceLevel>,

    /// computer_science, electrical_engineering, mechanical_engineering
    /// or other
    #[arg(long, value_name = "FIELD")]
    pub technical_background: Option<TechnicalBackground>,

    #[arg(long, value_name = "LANGUAGE")]
    pub primary_programming_language: Option<String>,
}

impl BackgroundArgs {
    pub fn into_update(self) -> BackgroundUpdate {
        BackgroundUpdate {
            software_experience: self.software_experience,
            hardware_experience: self.hardware_experience,
            technical_background: self.technical_background,
            primary_programming_language: self.primary_programming_language,
        }
    }

    /// Fill the questionnaire part of a signup; unanswered questions keep
    /// their defaults.
    pub fn apply_to(self, request: &mut SignUpRequest) {
        if let Some(level) = self.software_experience {
            request.software_experience = level;
        }
        if let Some(level) = self.hardware_experience {
            request.hardware_experience = level;
        }
        if let Some(field) = self.technical_background {
            request.technical_background = field;
        }
        if self.primary_programming_language.is_some() {
            request.primary_programming_language = self.primary_programming_language;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_accepts_selection() {
        let cli = Cli::parse_from(["bookshelf", "chat", "What is a node?", "--selection", "ROS 2"]);
        match cli.command {
            Commands::Chat { query, selection } => {
                assert_eq!(query, "What is a node?");
                assert_eq!(selection.as_deref(), Some("ROS 2"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn background_flags_parse_into_update() {
        let cli = Cli::parse_from([
            "bookshelf",
            "background",
            "--software-experience",
            "advanced",
            "--technical-background",
            "mechanical_engineering",
        ]);
        let Commands::Background { background } = cli.command else {
            panic!("expected background command");
        };
        let update = background.into_update();
        assert_eq!(update.software_experience, Some(ExperienceLevel::Advanced));
        assert_eq!(update.technical_background, Some(TechnicalBackground::MechanicalEngineering));
        assert_eq!(update.hardware_experience, None);
    }

    #[test]
    fn unknown_level_is_rejected() {
        let result = Cli::try_parse_from(["bookshelf", "background", "--software-experience", "guru"]);
        assert!(result.is_err());
    }

    #[test]
    fn signup_defaults_unanswered_questions() {
        let cli = Cli::parse_from([
            "bookshelf",
            "--env",
            "deployed",
            "signup",
            "--email",
            "a@b.com",
            "--password",
            "longpass1",
            "--hardware-experience",
            "intermediate",
        ]);
        assert_eq!(cli.env, Some(Environment::Deployed));
        let Commands::Signup {
            email,
            password,
            background,
            ..
        } = cli.command
        else {
            panic!("expected signup command");
        };
        let mut request = SignUpRequest::new(email, password);
        background.apply_to(&mut request);
        assert_eq!(request.hardware_experience, ExperienceLevel::Intermediate);
        assert_eq!(request.software_experience, ExperienceLevel::Beginner);
        assert_eq!(request.technical_background, TechnicalBackground::Other);
    }
}
