use bookvendor::{HttpClient, IdType, MetadataService};

use clap::{AppSettings, Subcommand};
use log::trace;

use crate::app;

#[derive(Subcommand)]
#[non_exhaustive]
pub enum Commands {
    /// Look up vendor metadata for a single book by identifier
    #[clap(setting(AppSettings::ArgRequiredElseHelp))]
    Lookup {
        /// The book identifier: ISBN-10, ISBN-13 or vendor ASIN
        id: String,

        /// The kind of identifier provided
        #[clap(long, default_value = "isbn")]
        id_type: String,
    },
    /// Search the vendor catalog for books by title and/or author
    Search {
        /// Title of the book to search for
        #[clap(short, long, default_value = "")]
        title: String,

        /// Author of the book to search for
        #[clap(short, long, default_value = "")]
        author: String,
    },
    /// Fetch the current BetterWorldBooks price listing for an ISBN
    #[clap(setting(AppSettings::ArgRequiredElseHelp))]
    Price {
        /// The book ISBN-10 or ISBN-13
        isbn: String,
    },
}

impl Commands {
    pub fn execute(self, service: &MetadataService<HttpClient>) -> eyre::Result<String> {
        match self {
            Commands::Lookup { id, id_type } => {
                let id_type: IdType = id_type.parse()?;
                trace!("Looking up {id_type} '{id}'..");
                match service.get_metadata(&id, id_type) {
                    Some(metadata) => app::to_json(&metadata),
                    None => Ok(format!("No metadata available for {id_type} '{id}'")),
                }
            }
            Commands::Search { title, author } => {
                trace!("Searching for title '{title}' and author '{author}'..");
                app::to_json(&service.search(&title, &author))
            }
            Commands::Price { isbn } => {
                trace!("Fetching the BetterWorldBooks listing for '{isbn}'..");
                match service.get_betterworldbooks_metadata(&isbn) {
                    Some(metadata) => app::to_json(&metadata),
                    None => Ok(format!("No listing available for ISBN '{isbn}'")),
                }
            }
        }
    }
}
