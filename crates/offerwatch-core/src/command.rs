//! Text commands accepted from the chat channel.
//!
//! Keywords follow the Traditional Chinese vocabulary of the bot, with
//! English aliases. Unrecognised text is not a command and yields `Ok(None)`.

use thiserror::Error;
use url::Url;

const ADD_USAGE: &str = "加入飯店 [名稱] [網址]";
const REMOVE_USAGE: &str = "移除飯店 [名稱]";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { name: String, url: String },
    Remove { name: String },
    List,
    Check,
    Help,
    Status,
    Subscribe,
    Unsubscribe,
}

/// Malformed command input. Rendered back to the user, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("missing argument, usage: {usage}")]
    MissingArgument { usage: &'static str },

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl CommandError {
    /// Corrective message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            CommandError::MissingArgument { usage } => {
                format!("❌ 格式錯誤！\n正確格式：{usage}\n\n範例：\n加入飯店 測試飯店 https://test.com")
            }
            CommandError::InvalidUrl { url, reason } => {
                format!("❌ 網址無效：{url}\n原因：{reason}\n請使用 http:// 或 https:// 開頭的網址")
            }
        }
    }
}

/// Parse a chat message into a command.
pub fn parse(text: &str) -> Result<Option<Command>, CommandError> {
    let text = text.trim();
    let (keyword, rest) = match text.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (text, ""),
    };

    match keyword.to_lowercase().as_str() {
        "加入飯店" | "add" => parse_add(rest).map(Some),
        "移除飯店" | "remove" => {
            if rest.is_empty() {
                Err(CommandError::MissingArgument {
                    usage: REMOVE_USAGE,
                })
            } else {
                Ok(Some(Command::Remove {
                    name: rest.to_string(),
                }))
            }
        }
        _ if !rest.is_empty() => Ok(None),
        "飯店清單" | "查看飯店清單" | "list" => Ok(Some(Command::List)),
        "立即檢查" | "檢查優惠" | "check" => Ok(Some(Command::Check)),
        "幫助" | "指令" | "help" => Ok(Some(Command::Help)),
        "系統狀態" | "狀態" | "status" => Ok(Some(Command::Status)),
        "訂閱" | "subscribe" => Ok(Some(Command::Subscribe)),
        "取消訂閱" | "unsubscribe" => Ok(Some(Command::Unsubscribe)),
        _ => Ok(None),
    }
}

fn parse_add(args: &str) -> Result<Command, CommandError> {
    let mut parts = args.split_whitespace();
    let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
        return Err(CommandError::MissingArgument { usage: ADD_USAGE });
    };
    validate_source_url(url)?;
    Ok(Command::Add {
        name: name.to_string(),
        url: url.to_string(),
    })
}

/// Accept only absolute http(s) URLs with a host.
pub fn validate_source_url(url: &str) -> Result<(), CommandError> {
    let parsed = Url::parse(url).map_err(|e| CommandError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        "http" | "https" => Err(CommandError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        }),
        scheme => Err(CommandError::InvalidUrl {
            url: url.to_string(),
            reason: format!("scheme '{scheme}' is not allowed"),
        }),
    }
}

/// Help text listing every command.
pub fn help_text(schedule: &str) -> String {
    format!(
        "🤖 飯店優惠監控機器人\n\n\
         📋 基本指令：\n\
         • 飯店清單 - 查看監控中的飯店\n\
         • 檢查優惠 - 立即檢查所有飯店\n\
         • 狀態 - 系統狀態\n\
         • 訂閱 / 取消訂閱 - 接收或停止優惠通知\n\
         • 指令 - 顯示此說明\n\n\
         🔧 管理指令：\n\
         • {ADD_USAGE}\n\
         • {REMOVE_USAGE}\n\n\
         📝 範例：\n\
         加入飯店 測試飯店 https://test.com\n\
         移除飯店 測試飯店\n\n\
         ⏰ 自動檢查時間：{schedule}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_in_both_languages() {
        let expected = Command::Add {
            name: "測試飯店".into(),
            url: "https://test.com".into(),
        };
        assert_eq!(parse("加入飯店 測試飯店 https://test.com").unwrap(), Some(expected));
        assert_eq!(
            parse("  add Harbor https://harbor.example/deals ").unwrap(),
            Some(Command::Add {
                name: "Harbor".into(),
                url: "https://harbor.example/deals".into(),
            })
        );
    }

    #[test]
    fn add_without_url_is_malformed() {
        let err = parse("加入飯店 測試飯店").unwrap_err();
        assert_eq!(err, CommandError::MissingArgument { usage: ADD_USAGE });
        assert!(err.user_message().contains("格式錯誤"));
    }

    #[test]
    fn add_with_bad_url_is_rejected() {
        assert!(matches!(
            parse("add Test not-a-url"),
            Err(CommandError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse("add Test ftp://files.example/"),
            Err(CommandError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn remove_keeps_full_name() {
        assert_eq!(
            parse("移除飯店 Grand Hotel Annex").unwrap(),
            Some(Command::Remove {
                name: "Grand Hotel Annex".into()
            })
        );
        assert!(matches!(
            parse("remove"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn parses_argumentless_commands() {
        assert_eq!(parse("飯店清單").unwrap(), Some(Command::List));
        assert_eq!(parse("查看飯店清單").unwrap(), Some(Command::List));
        assert_eq!(parse("立即檢查").unwrap(), Some(Command::Check));
        assert_eq!(parse("CHECK").unwrap(), Some(Command::Check));
        assert_eq!(parse("指令").unwrap(), Some(Command::Help));
        assert_eq!(parse("help").unwrap(), Some(Command::Help));
        assert_eq!(parse("狀態").unwrap(), Some(Command::Status));
        assert_eq!(parse("訂閱").unwrap(), Some(Command::Subscribe));
        assert_eq!(parse("取消訂閱").unwrap(), Some(Command::Unsubscribe));
    }

    #[test]
    fn other_text_is_not_a_command() {
        assert_eq!(parse("hello there").unwrap(), None);
        assert_eq!(parse("status please").unwrap(), None);
        assert_eq!(parse("").unwrap(), None);
    }

    #[test]
    fn help_mentions_schedule() {
        let help = help_text("08:00, 14:00");
        assert!(help.contains("08:00, 14:00"));
        assert!(help.contains(ADD_USAGE));
    }
}
