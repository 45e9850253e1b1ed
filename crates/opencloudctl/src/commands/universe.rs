//! Universe and place command implementations

use opencloudctl_core::universes::{PlaceUpdate, UniverseHandler, UniverseMessage};

use crate::cli::{self, UniverseCommands};
use crate::connection::ConnectionManager;
use crate::error::Result as CliResult;
use crate::output::{OutputFormat, print_output};

pub async fn handle_universe_command(
    universe_cmd: &UniverseCommands,
    conn_mgr: &ConnectionManager,
    profile_name: Option<&str>,
    output_format: cli::OutputFormat,
) -> CliResult<()> {
    let handler = UniverseHandler::new(conn_mgr.create_client(profile_name)?);
    let format = OutputFormat::resolve(output_format, OutputFormat::Table);

    match universe_cmd {
        UniverseCommands::Get { universe } => {
            let universe = handler.get_universe(universe).await?;
            print_output(universe, format)?;
        }
        UniverseCommands::Place { universe, place } => {
            let place = handler.get_place(universe, place).await?;
            print_output(place, format)?;
        }
        UniverseCommands::UpdatePlace {
            universe,
            place,
            display_name,
            description,
            server_size,
        } => {
            let update = PlaceUpdate {
                display_name: display_name.clone(),
                description: description.clone(),
                server_size: *server_size,
            };
            let place = handler.update_place(universe, place, &update).await?;
            print_output(place, format)?;
        }
        UniverseCommands::Publish {
            universe,
            topic,
            message,
        } => {
            handler
                .publish_message(universe, &UniverseMessage::new(topic, message))
                .await?;
            println!("Published message on topic '{}'", topic);
        }
        UniverseCommands::Restart { universe } => {
            handler.restart_servers(universe).await?;
            println!("Requested restart of all servers in universe {}", universe);
        }
    }

    Ok(())
}
