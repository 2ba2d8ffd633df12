//! IRC line parsing and reply codes

/// Longest line, including CR LF
pub const MAX_LINE_LEN: usize = 512;

pub const RPL_WELCOME: &str = "001";
pub const RPL_YOURHOST: &str = "002";
pub const RPL_CREATED: &str = "003";
pub const RPL_MYINFO: &str = "004";
pub const RPL_UMODEIS: &str = "221";
pub const RPL_ENDOFWHO: &str = "315";
pub const RPL_LISTSTART: &str = "321";
pub const RPL_LIST: &str = "322";
pub const RPL_LISTEND: &str = "323";
pub const RPL_CHANNELMODEIS: &str = "324";
pub const RPL_NOTOPIC: &str = "331";
pub const RPL_TOPIC: &str = "332";
pub const RPL_WHOREPLY: &str = "352";
pub const RPL_NAMREPLY: &str = "353";
pub const RPL_ENDOFNAMES: &str = "366";
pub const RPL_MOTD: &str = "372";
pub const RPL_MOTDSTART: &str = "375";
pub const RPL_ENDOFMOTD: &str = "376";
pub const ERR_NOSUCHNICK: &str = "401";
pub const ERR_NOSUCHCHANNEL: &str = "403";
pub const ERR_CANNOTSENDTOCHAN: &str = "404";
pub const ERR_NORECIPIENT: &str = "411";
pub const ERR_NOTEXTTOSEND: &str = "412";
pub const ERR_UNKNOWNCOMMAND: &str = "421";
pub const ERR_NONICKNAMEGIVEN: &str = "431";
pub const ERR_ERRONEUSNICKNAME: &str = "432";
pub const ERR_NICKNAMEINUSE: &str = "433";
pub const ERR_NOTONCHANNEL: &str = "442";
pub const ERR_NOTREGISTERED: &str = "451";
pub const ERR_NEEDMOREPARAMS: &str = "461";
pub const ERR_ALREADYREGISTRED: &str = "462";
pub const ERR_CHANOPRIVSNEEDED: &str = "482";

/// One parsed client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    /// Optional `:prefix`
    pub prefix: Option<String>,
    /// Command, uppercased
    pub command: String,
    /// Parameters, trailing parameter last
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse a line; returns `None` for blank lines
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start();

        // IRCv3 message tags are not supported; skip them
        if rest.starts_with('@') {
            rest = rest.split_once(' ').map_or("", |(_, r)| r).trim_start();
        }

        let prefix = match rest.strip_prefix(':') {
            Some(p) => {
                let (prefix, r) = p.split_once(' ').unwrap_or((p, ""));
                rest = r.trim_start();
                Some(prefix.to_string())
            }
            None => None,
        };

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, r) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_string());
            rest = r;
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Parameter by index
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

/// Truncate a line so that it fits in [`MAX_LINE_LEN`] with CR LF
pub fn truncate_line(line: &str) -> &str {
    let limit = MAX_LINE_LEN - 2;
    if line.len() <= limit {
        return line;
    }
    let mut end = limit;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_never_panics(line in "\\PC{0,600}") {
            let _ = IrcMessage::parse(&line);
        }

        #[test]
        fn truncated_lines_fit(line in "\\PC{0,800}") {
            let cut = truncate_line(&line);
            prop_assert!(cut.len() <= MAX_LINE_LEN - 2);
            prop_assert!(line.starts_with(cut));
        }

        #[test]
        fn trailing_param_survives(text in "[^\\r\\n\\x00]{0,100}") {
            let msg = IrcMessage::parse(&format!("PRIVMSG #APRS :{}", text)).unwrap();
            prop_assert_eq!(msg.param(1), Some(text.as_str()));
        }
    }
}
