//! Universe and place command definitions

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum UniverseCommands {
    /// Get a universe
    Get {
        /// Universe ID
        universe: String,
    },

    /// Get a place in a universe
    Place {
        /// Universe ID
        universe: String,

        /// Place ID
        place: String,
    },

    /// Update a place's name, description, or server size
    #[command(after_help = "EXAMPLES:
    # Rename a place
    opencloudctl universe update-place 1234 5678 --display-name 'Lobby'

    # Allow up to 50 players per server
    opencloudctl universe update-place 1234 5678 --server-size 50
")]
    UpdatePlace {
        /// Universe ID
        universe: String,

        /// Place ID
        place: String,

        /// New display name
        #[arg(long)]
        display_name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Maximum players per server (1-200)
        #[arg(long)]
        server_size: Option<u32>,
    },

    /// Publish a message to every running server
    Publish {
        /// Universe ID
        universe: String,

        /// Message topic
        topic: String,

        /// Message payload
        message: String,
    },

    /// Restart every running server in the universe
    Restart {
        /// Universe ID
        universe: String,
    },
}
