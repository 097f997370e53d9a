//! Command-line interface of the B2C directory shell.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, InputError};
use crate::graph::GraphClient;

/// Query used to locate the application that owns B2C extension attributes.
pub const B2C_EXTENSIONS_APP_QUERY: &str = "$filter=startswith(displayName, 'b2c-extensions-app')";

#[derive(Debug, Parser)]
#[command(name = "b2c-graph", version, about = "Manage users and extension attributes in an Azure AD B2C directory")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(
        long = "config",
        short = 'c',
        env = "B2C_GRAPH_CONFIG",
        global = true,
        help = "Specify a configuration file"
    )]
    pub config_file_path: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,

    #[arg(short, long, global = true, help = "Show request diagnostics")]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Directory(DirectoryCommand),

    #[command(about = "Give syntax information for each command, along with examples")]
    Syntax,
}

/// Commands that call the directory API.
#[derive(Debug, Subcommand)]
pub enum DirectoryCommand {
    #[command(about = "Read users from your B2C directory. Optionally accepts an objectId or a query expression")]
    GetUser {
        /// User objectId, or a query such as `$top=5`
        selector: Option<String>,
    },

    #[command(about = "Create a new user in your B2C directory from a .json file")]
    CreateUser { json_file: PathBuf },

    #[command(about = "Update an existing user in your B2C directory from a .json file")]
    UpdateUser { object_id: String, json_file: PathBuf },

    #[command(about = "Delete an existing user in your B2C directory")]
    DeleteUser { object_id: String },

    #[command(about = "List all extension attributes registered on the b2c-extensions-app")]
    GetExtensionAttribute { app_object_id: String },

    #[command(about = "Register an extension attribute on an application from a .json file")]
    RegisterExtension {
        app_object_id: String,
        json_file: PathBuf,
    },

    #[command(about = "Remove an extension attribute from an application")]
    UnregisterExtension {
        app_object_id: String,
        extension_object_id: String,
    },

    #[command(
        name = "get-b2c-application",
        about = "Get the B2C extensions application, so you can pass its objectId to other commands"
    )]
    GetB2cApplication,
}

/// How `get-user` selects users.
#[derive(Debug, PartialEq, Eq)]
pub enum UserSelector {
    All,
    ById(String),
    Query(String),
}

impl UserSelector {
    /// An argument that parses as a UUID is an objectId; anything else is a query.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None => Self::All,
            Some(arg) if Uuid::parse_str(arg).is_ok() => Self::ById(arg.to_string()),
            Some(arg) => Self::Query(arg.to_string()),
        }
    }
}

impl Cli {
    /// Parse from the process arguments.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_command_case(std::env::args_os()))
    }
}

/// Accept `Get-User`, `GET-USER` and friends by lowercasing the first
/// argument that names a subcommand case-insensitively.
pub fn normalize_command_case(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let command = Cli::command();
    let names: Vec<String> = command
        .get_subcommands()
        .map(|c| c.get_name().to_string())
        .chain(std::iter::once("help".to_string()))
        .collect();

    let mut normalized = false;
    args.into_iter()
        .enumerate()
        .map(|(idx, arg)| {
            if idx == 0 || normalized {
                return arg;
            }
            match arg.to_str().map(str::to_ascii_lowercase) {
                Some(lower) if names.contains(&lower) => {
                    normalized = true;
                    OsString::from(lower)
                }
                _ => arg,
            }
        })
        .collect()
}

impl DirectoryCommand {
    /// Run a directory command and return the raw response body.
    pub async fn execute(self, client: &GraphClient) -> Result<String, AppError> {
        match self {
            DirectoryCommand::GetUser { selector } => match UserSelector::from_arg(selector.as_deref()) {
                UserSelector::All => client.get_all_users(None).await,
                UserSelector::ById(object_id) => client.get_user_by_object_id(&object_id).await,
                UserSelector::Query(query) => client.get_all_users(Some(&query)).await,
            },
            DirectoryCommand::CreateUser { json_file } => {
                let json = read_json_file(&json_file)?;
                client.create_user(&json).await
            }
            DirectoryCommand::UpdateUser {
                object_id,
                json_file,
            } => {
                let json = read_json_file(&json_file)?;
                client.update_user(&object_id, &json).await
            }
            DirectoryCommand::DeleteUser { object_id } => client.delete_user(&object_id).await,
            DirectoryCommand::GetExtensionAttribute { app_object_id } => {
                client.get_extensions(&app_object_id).await
            }
            DirectoryCommand::RegisterExtension {
                app_object_id,
                json_file,
            } => {
                let json = read_json_file(&json_file)?;
                client.register_extension(&app_object_id, &json).await
            }
            DirectoryCommand::UnregisterExtension {
                app_object_id,
                extension_object_id,
            } => {
                client
                    .unregister_extension(&app_object_id, &extension_object_id)
                    .await
            }
            DirectoryCommand::GetB2cApplication => {
                client.get_applications(Some(B2C_EXTENSIONS_APP_QUERY)).await
            }
        }
    }
}

/// Read a request body from disk; the content is passed on untouched.
pub fn read_json_file(path: &Path) -> Result<String, InputError> {
    debug!("Reading request body from {:?}", path);
    fs::read_to_string(path).map_err(|source| InputError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    })
}
