//! Command-line arguments and command execution.

use std::io::{self, Read, Write};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use blogdesk_core::api::{ApiClient, ApiError};
use blogdesk_core::auth::{Credentials, NewUser};
use blogdesk_core::models::{NewPost, PaginatedResult, Post, PostUpdate, UserProfile};
use blogdesk_core::services::{CommentService, PostService, ProfileService, SearchService};
use blogdesk_core::{Config, SessionEvent};

use crate::utils::{format_date, pluralize, relative_time, single_line, truncate_string};

const ENV_HELP: &str = "\
Environment:
  BLOGDESK_API_URL           API base URL (default http://localhost:8000/api/)
  BLOGDESK_SESSION_BACKEND   file | keyring
  BLOGDESK_LOG_DIR           Also write logs to a daily file in this directory
  RUST_LOG                   Log filter (default warn)";

/// Width of the title column in post listings
const TITLE_WIDTH: usize = 48;

/// Length of the content preview under each listed post
const PREVIEW_WIDTH: usize = 72;

/// `blogdesk` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "blogdesk",
    about = "Read and write posts on the blog platform from the terminal",
    version,
    after_help = ENV_HELP
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// `--page N`, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Args)]
pub struct PageArg {
    /// Page number, starting at 1.
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Sign in (prompts for the password).
    Login {
        /// Defaults to the last username used.
        username: Option<String>,
    },
    /// Create an account and sign in.
    Register { username: String, email: String },
    /// Sign out and forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// List all posts, newest first.
    Posts {
        #[command(flatten)]
        page: PageArg,
    },
    /// List your own posts.
    MyPosts {
        #[command(flatten)]
        page: PageArg,
    },
    /// Show a post with its comments.
    Show {
        #[arg(value_name = "ID", value_parser = parse_post_id)]
        id: i64,
    },
    /// Create a post. CONTENT is read from stdin when omitted.
    NewPost { title: String, content: Option<String> },
    /// Edit a post you wrote.
    EditPost {
        #[arg(value_name = "ID", value_parser = parse_post_id)]
        id: i64,
        #[arg(long)]
        title: Option<String>,
        /// New content, or `-` to read it from stdin.
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a post you wrote.
    DeletePost {
        #[arg(value_name = "ID", value_parser = parse_post_id)]
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Comment on a post.
    Comment {
        #[arg(value_name = "POST_ID", value_parser = parse_post_id)]
        post_id: i64,
        #[arg(value_name = "TEXT", required = true)]
        content: Vec<String>,
    },
    /// Search post titles and content.
    Search {
        #[arg(value_name = "QUERY", required = true)]
        query: Vec<String>,
        #[command(flatten)]
        page: PageArg,
    },
    /// Show a profile and its posts. Defaults to your own.
    Profile {
        username: Option<String>,
        #[command(flatten)]
        page: PageArg,
    },
    /// Change your email address.
    SetEmail { email: String },
}

/// Post IDs may be written as `12` or `#12`.
fn parse_post_id(value: &str) -> Result<i64, String> {
    value
        .trim_start_matches('#')
        .parse()
        .map_err(|_| format!("invalid post ID '{}'", value))
}

/// Run `command` against the configured backend.
pub async fn execute(command: Command, config: &mut Config) -> Result<()> {
    let client = config.build_client()?;
    let mut events = client.subscribe();
    let result = run_command(command, config, &client).await;
    report_session_events(&mut events);
    result
}

async fn run_command(command: Command, config: &mut Config, client: &ApiClient) -> Result<()> {
    let now = Utc::now();

    match command {
        Command::Login { username } => {
            let username = match username.or_else(|| config.last_username.clone()) {
                Some(username) => username,
                None => prompt("Username: ")?,
            };
            let password = rpassword::prompt_password(format!("Password for {}: ", username))
                .context("Failed to read password")?;

            let auth = config.auth_service(client.clone());
            let user = auth.login(&Credentials::new(username, password)).await?;
            remember_username(config, &user.username);
            println!("Signed in as {}", user.username);
        }

        Command::Register { username, email } => {
            let password = rpassword::prompt_password("Password: ")
                .context("Failed to read password")?;
            let confirm = rpassword::prompt_password("Confirm password: ")
                .context("Failed to read password")?;

            let auth = config.auth_service(client.clone());
            let new_user = NewUser::new(username, email, password).with_confirmation(confirm);
            let user = auth.register(&new_user).await?;
            remember_username(config, &user.username);
            println!("Account created. Signed in as {}", user.username);
        }

        Command::Logout => {
            let auth = config.auth_service(client.clone());
            if !auth.is_authenticated() {
                println!("Not signed in");
                return Ok(());
            }
            auth.logout().await?;
            println!("Signed out");
        }

        Command::Whoami => match client.session().user() {
            Some(user) => {
                println!("{} (id {})", user.username, user.id);
                if let Some(ref email) = user.email {
                    println!("{}", email);
                }
            }
            None => println!("Not signed in"),
        },

        Command::Posts { page } => {
            let posts = PostService::new(client.clone()).list(page.page).await?;
            print_post_page(&posts, "No posts yet.", now);
        }

        Command::MyPosts { page } => {
            let posts = PostService::new(client.clone()).list_mine(page.page).await?;
            print_post_page(&posts, "You have not written any posts yet.", now);
        }

        Command::Show { id } => {
            let post = PostService::new(client.clone()).get(id).await?;
            let comments = if post.comments.is_empty() && post.comments_count > 0 {
                CommentService::new(client.clone()).list(id).await?
            } else {
                post.comments.clone()
            };

            print_post(&post, now);
            println!();
            println!("{}", pluralize(comments.len() as i64, "comment"));
            for comment in &comments {
                println!(
                    "  {} · {}\n    {}",
                    comment.author.username,
                    relative_time(&comment.created_at, now),
                    comment.content.replace('\n', "\n    ")
                );
            }
            if client.session().can_edit(&post) {
                println!();
                println!("You wrote this post: `blogdesk edit-post {}` to change it.", post.id);
            }
        }

        Command::NewPost { title, content } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            let post = PostService::new(client.clone())
                .create(&NewPost::new(title, content))
                .await?;
            println!("Created post #{}: {}", post.id, post.title);
        }

        Command::EditPost { id, title, content } => {
            let content = match content.as_deref() {
                Some("-") => Some(read_stdin()?),
                _ => content,
            };
            let post = PostService::new(client.clone())
                .update(id, &PostUpdate { title, content })
                .await?;
            println!("Updated post #{}: {}", post.id, post.title);
        }

        Command::DeletePost { id, yes } => {
            if !yes {
                let answer = prompt(&format!("Delete post #{}? [y/N] ", id))?;
                if !matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
                    println!("Cancelled");
                    return Ok(());
                }
            }
            PostService::new(client.clone()).delete(id).await?;
            println!("Deleted post #{}", id);
        }

        Command::Comment { post_id, content } => {
            let comment = CommentService::new(client.clone())
                .create(post_id, &content.join(" "))
                .await?;
            println!("Comment #{} added to post #{}", comment.id, post_id);
        }

        Command::Search { query, page } => {
            let query = query.join(" ");
            let results = SearchService::new(client.clone()).search(&query, page.page).await?;
            if query.trim().is_empty() {
                println!("Enter something to search for.");
            } else {
                print_post_page(&results, &format!("No posts match '{}'.", query.trim()), now);
            }
        }

        Command::Profile { username, page } => {
            let username = match username.or_else(|| client.session().user().map(|u| u.username.clone())) {
                Some(username) => username,
                None => bail!("Not signed in. Name a user: blogdesk profile USERNAME"),
            };
            let profile = ProfileService::new(client.clone()).get(&username, page.page).await?;
            print_profile(&profile, now);
        }

        Command::SetEmail { email } => {
            let user = ProfileService::new(client.clone()).update_email(&email).await?;
            println!("Email for {} is now {}", user.username, user.email.as_deref().unwrap_or("-"));
        }
    }

    Ok(())
}

fn remember_username(config: &mut Config, username: &str) {
    if config.last_username.as_deref() == Some(username) {
        return;
    }
    config.last_username = Some(username.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("Failed to read input")?;
    Ok(line.trim().to_string())
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read post content from stdin")?;
    Ok(content)
}

fn print_post_page(page: &PaginatedResult<Post>, empty_message: &str, now: chrono::DateTime<Utc>) {
    if page.is_empty() {
        println!("{}", empty_message);
        return;
    }

    for post in &page.items {
        println!(
            "#{:<5} {:<width$}  {:<16} {}",
            post.id,
            truncate_string(&post.title, TITLE_WIDTH),
            truncate_string(&post.author.username, 16),
            relative_time(&post.created_at, now),
            width = TITLE_WIDTH,
        );
        println!(
            "       {}  ({})",
            truncate_string(&single_line(&post.content), PREVIEW_WIDTH),
            pluralize(post.comments_count, "comment")
        );
    }

    println!();
    print!("Page {} of {} ({} total)", page.current_page, page.total_pages, page.total_count);
    match (page.previous_page(), page.next_page()) {
        (Some(prev), Some(next)) => println!(", --page {} / --page {}", prev, next),
        (Some(prev), None) => println!(", previous: --page {}", prev),
        (None, Some(next)) => println!(", next: --page {}", next),
        (None, None) => println!(),
    }
}

fn print_post(post: &Post, now: chrono::DateTime<Utc>) {
    println!("#{} {}", post.id, post.title);
    let edited = if post.was_edited() {
        format!(" (edited {})", relative_time(&post.updated_at, now))
    } else {
        String::new()
    };
    println!("by {} on {}{}", post.author.username, format_date(&post.created_at), edited);
    println!();
    println!("{}", post.content);
}

fn print_profile(profile: &UserProfile, now: chrono::DateTime<Utc>) {
    let user = &profile.user;
    println!("{}", user.username);
    if let Some(ref email) = user.email {
        println!("  email:  {}", email);
    }
    if let Some(ref joined) = user.date_joined {
        println!("  joined: {}", format_date(joined));
    }
    if let Some(count) = user.posts_count {
        println!("  {}", pluralize(count, "post"));
    }
    println!();
    print_post_page(&profile.posts, "No posts yet.", now);
}

fn report_session_events(events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match events.try_recv() {
            Ok(SessionEvent::Expired) => {
                eprintln!("Your session has expired. Run `blogdesk login` to sign in again.");
            }
            Ok(event) => debug!(?event, "Session event"),
            Err(TryRecvError::Lagged(skipped)) => debug!(skipped, "Missed session events"),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

/// Print an error to stderr, listing field errors one per line.
pub fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Validation(errors)) => {
            eprintln!("error: invalid input");
            for (field, messages) in errors.iter() {
                for message in messages {
                    eprintln!("  {}: {}", field, message);
                }
            }
        }
        Some(api_error) => {
            eprintln!("error: {}", api_error);
            if api_error.is_retryable() {
                eprintln!("This may be temporary. Try again in a moment.");
            } else if matches!(api_error, ApiError::Unauthenticated) {
                eprintln!("Run `blogdesk login` to sign in.");
            }
        }
        None => eprintln!("error: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(line: &str) -> Result<Command, clap::Error> {
        let args = std::iter::once("blogdesk").chain(line.split_whitespace());
        Cli::try_parse_from(args).map(|cli| cli.command)
    }

    fn page(page: u32) -> PageArg {
        PageArg { page }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_paged_commands() {
        assert_eq!(parse("posts").unwrap(), Command::Posts { page: page(1) });
        assert_eq!(parse("my-posts --page 3").unwrap(), Command::MyPosts { page: page(3) });
        assert_eq!(
            parse("search rust async --page=2").unwrap(),
            Command::Search {
                query: vec!["rust".into(), "async".into()],
                page: page(2)
            }
        );
        assert!(parse("posts --page 0").is_err());
        assert!(parse("posts --page").is_err());
        assert!(parse("posts --page two").is_err());
    }

    #[test]
    fn test_parse_edit_post_flags() {
        assert_eq!(
            parse("edit-post --title New 12").unwrap(),
            Command::EditPost {
                id: 12,
                title: Some("New".into()),
                content: None
            }
        );
        assert_eq!(
            parse("edit-post #12 --content -").unwrap(),
            Command::EditPost {
                id: 12,
                title: None,
                content: Some("-".into())
            }
        );
    }

    #[test]
    fn test_parse_comment_collects_words() {
        assert_eq!(
            parse("comment 7 nice post").unwrap(),
            Command::Comment {
                post_id: 7,
                content: vec!["nice".into(), "post".into()]
            }
        );
        assert!(parse("comment 7").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("show").is_err());
        assert!(parse("show abc").is_err());
        assert!(parse("register alice").is_err());
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn test_profile_and_delete_defaults() {
        assert_eq!(
            parse("profile").unwrap(),
            Command::Profile {
                username: None,
                page: page(1)
            }
        );
        assert_eq!(parse("whoami").unwrap(), Command::Whoami);
        assert_eq!(
            parse("delete-post 4 --yes").unwrap(),
            Command::DeletePost { id: 4, yes: true }
        );
    }
}
