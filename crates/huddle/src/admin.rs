//! Team, question and migration commands.

use std::path::Path;
use std::sync::Arc;

use miette::Result;
use tracing::info;

use huddle_scheduler::{Engine, EngineConfig, QuestionForm};
use huddle_slack::SlackClient;
use huddle_store::{Question, Store, Team};

use crate::{QuestionCommand, TeamCommand};

fn open_engine(database: &Path) -> Result<Engine> {
    let store = Store::open(database)
        .map_err(|e| miette::miette!("failed to open {}: {}", database.display(), e))?;
    Ok(Engine::new(Arc::new(store), EngineConfig::default()))
}

fn describe(question: &Question) -> String {
    format!(
        "#{} team={} channel={} cron=\"{}\" active={} users={} current={}",
        question.id,
        question.team_id,
        question.channel,
        question.cron,
        question.active,
        question.users.join(","),
        question.current_round.as_deref().unwrap_or("-"),
    )
}

pub async fn run_team_command(
    database: &Path,
    slack_api_url: &str,
    command: TeamCommand,
) -> Result<()> {
    let engine = open_engine(database)?;

    match command {
        TeamCommand::Add { token } => {
            let client = SlackClient::with_base_url(&token, slack_api_url)
                .map_err(|e| miette::miette!("{}", e))?;
            let auth = client
                .auth_test()
                .await
                .map_err(|e| miette::miette!("token check failed: {}", e))?;

            let team = Team {
                id: auth.team_id,
                name: auth.team,
                token,
            };
            engine
                .store()
                .save_team(&team)
                .map_err(|e| miette::miette!("{}", e))?;
            info!(team = %team.id, name = %team.name, "registered team");
            println!("Registered team {} ({})", team.id, team.name);
        }

        TeamCommand::List => {
            let teams = engine
                .store()
                .list_teams()
                .map_err(|e| miette::miette!("{}", e))?;
            for team in teams {
                println!("{} {}", team.id, team.name);
            }
        }
    }

    Ok(())
}

pub async fn run_question_command(
    database: &Path,
    slack_api_url: &str,
    command: QuestionCommand,
) -> Result<()> {
    let engine = open_engine(database)?;

    match command {
        QuestionCommand::Add {
            team,
            channel,
            message,
            users,
            cron,
            active,
        } => {
            let form = QuestionForm {
                message,
                users,
                cron,
                active,
            };
            let question = engine
                .create_question(&team, &channel, &form)
                .map_err(|e| miette::miette!("{}", e))?;
            println!("Created question {}", describe(&question));
        }

        QuestionCommand::List { team, channel } => {
            let questions = match (team, channel) {
                (Some(team), Some(channel)) => engine.list_channel_questions(&team, &channel),
                _ => engine.store().list_questions().map_err(Into::into),
            }
            .map_err(|e| miette::miette!("{}", e))?;
            for question in &questions {
                println!("{}", describe(question));
            }
        }

        QuestionCommand::Invoke { id } => {
            let question = engine
                .store()
                .load_question(id)
                .map_err(|e| miette::miette!("{}", e))?
                .ok_or_else(|| miette::miette!("question {} not found", id))?;
            let team = engine
                .store()
                .load_team(&question.team_id)
                .map_err(|e| miette::miette!("{}", e))?
                .ok_or_else(|| miette::miette!("team {} is not registered", question.team_id))?;

            engine
                .connect_team(&team, slack_api_url)
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            let round = engine
                .invoke_question(id, &question.channel)
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            println!("Posted round {}", round.key());
        }

        QuestionCommand::Delete { id } => {
            let rounds = engine
                .delete_question(id)
                .map_err(|e| miette::miette!("{}", e))?;
            println!("Deleted question {} and {} rounds", id, rounds);
        }
    }

    Ok(())
}

pub fn run_migrate(database: &Path, team: &str) -> Result<()> {
    let engine = open_engine(database)?;
    let updated = engine
        .store()
        .assign_team_to_orphans(team)
        .map_err(|e| miette::miette!("{}", e))?;
    println!("Assigned team {} to {} questions", team, updated);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Question {
        Question {
            id: 3,
            team_id: "T1".to_string(),
            channel: "C1".to_string(),
            message: "Status?".to_string(),
            users: vec!["U1".to_string(), "U2".to_string()],
            cron: "0 9 * * 1-5".to_string(),
            current_round: None,
            active: true,
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&sample()),
            "#3 team=T1 channel=C1 cron=\"0 9 * * 1-5\" active=true users=U1,U2 current=-"
        );
    }

    #[tokio::test]
    async fn test_question_commands_against_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("huddle.db");

        run_question_command(
            &database,
            huddle_slack::DEFAULT_API_URL,
            QuestionCommand::Add {
                team: "T1".to_string(),
                channel: "C1".to_string(),
                message: "Status?".to_string(),
                users: vec!["U1".to_string()],
                cron: "0 9 * * *".to_string(),
                active: true,
            },
        )
        .await
        .unwrap();

        let invalid = run_question_command(
            &database,
            huddle_slack::DEFAULT_API_URL,
            QuestionCommand::Add {
                team: "T1".to_string(),
                channel: "C1".to_string(),
                message: "Status?".to_string(),
                users: vec!["U1".to_string()],
                cron: "tomorrow".to_string(),
                active: true,
            },
        )
        .await;
        assert!(invalid.is_err());

        run_question_command(
            &database,
            huddle_slack::DEFAULT_API_URL,
            QuestionCommand::Delete { id: 1 },
        )
        .await
        .unwrap();

        let store = Store::open(&database).unwrap();
        assert!(store.list_questions().unwrap().is_empty());
    }

    #[test]
    fn test_migrate_assigns_team() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("huddle.db");
        {
            let store = Store::open(&database).unwrap();
            let mut legacy = sample();
            legacy.id = 0;
            legacy.team_id = String::new();
            store.save_question(&mut legacy).unwrap();
        }

        run_migrate(&database, "T7").unwrap();

        let store = Store::open(&database).unwrap();
        assert_eq!(store.load_question(1).unwrap().unwrap().team_id, "T7");
    }
}
