//! IRC server core
//!
//! Network I/O runs in per-connection tokio tasks which only move lines in
//! and out. All registry mutation happens in [`IrcServer::process_connections`]
//! (one step of the gateway tick) and in the server-side API used by the
//! gateway to manage virtual clients. Listener callbacks are collected while
//! the registry lock is held and invoked after it is released.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::channel::{is_channel_name, Channel, ChannelInfo};
use crate::client::{
    fold_case, is_valid_nick, Client, ClientId, ClientInfo, ConnectionKind,
};
use crate::error::IrcError;
use crate::listener::{ChatMessage, ClientConnectionListener, MessageListener};
use crate::message::*;

/// Server version reported in the registration burst
const VERSION: &str = concat!("ax25irc-", env!("CARGO_PKG_VERSION"));

/// Upper bound on bytes read for one inbound line
const MAX_READ: u64 = 8192;

/// Milliseconds since the UNIX epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Server identity
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name used as reply prefix
    pub name: String,
    /// Message of the day lines
    pub motd: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "ax25irc".to_string(),
            motd: vec![
                "AX.25 / APRS packet radio gateway".to_string(),
                "RF stations appear as users. Try /list".to_string(),
            ],
        }
    }
}

enum NetEvent {
    Accepted {
        id: ClientId,
        addr: String,
        tx: mpsc::UnboundedSender<String>,
    },
    Line {
        id: ClientId,
        line: String,
    },
    Closed {
        id: ClientId,
    },
}

enum Callback {
    Message {
        listeners: Vec<Arc<dyn MessageListener>>,
        message: ChatMessage,
    },
    Registered {
        listeners: Vec<Arc<dyn ClientConnectionListener>>,
        client: ClientId,
    },
}

struct Inner {
    state: Mutex<ServerState>,
    next_id: AtomicU64,
    events_tx: mpsc::UnboundedSender<NetEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<NetEvent>>,
    closed: watch::Sender<bool>,
}

/// Handle to the IRC server; cheap to clone
#[derive(Clone)]
pub struct IrcServer {
    inner: Arc<Inner>,
}

impl IrcServer {
    /// Create a server with no channels and no listening socket
    pub fn new(config: ServerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ServerState::new(config)),
                next_id: AtomicU64::new(1),
                events_tx,
                events_rx: Mutex::new(events_rx),
                closed,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_client_id(&self) -> ClientId {
        ClientId(self.inner.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Server name
    pub fn server_name(&self) -> String {
        self.state().config.name.clone()
    }

    /// Bind the TCP listener and spawn the acceptor task
    ///
    /// Returns the bound address. An accept failure closes the server.
    pub async fn bind(&self, addr: &str) -> Result<SocketAddr, IrcError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| IrcError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local = listener.local_addr()?;
        info!("IRC server listening on {}", local);

        let server = self.clone();
        tokio::spawn(async move { server.run_acceptor(listener).await });
        Ok(local)
    }

    async fn run_acceptor(self, listener: TcpListener) {
        let mut closed = self.inner.closed.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, peer)) => {
                        self.accept_stream(stream, peer.to_string());
                    }
                    Err(e) => {
                        error!("IRC acceptor failed: {}", e);
                        self.close();
                        break;
                    }
                },
                _ = closed.wait_for(|c| *c) => break,
            }
        }
        info!("IRC acceptor stopped");
    }

    /// Attach a client over any byte stream
    ///
    /// The client is registered on the next [`process_connections`](Self::process_connections).
    pub fn accept_stream<T>(&self, io: T, addr: impl Into<String>) -> ClientId
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = self.next_client_id();
        let addr = addr.into();
        let (reader, writer) = tokio::io::split(io);
        let (tx, rx) = mpsc::unbounded_channel();

        info!("Accepted {} from {}", id, addr);
        let _ = self.inner.events_tx.send(NetEvent::Accepted { id, addr, tx });

        tokio::spawn(read_lines(
            id,
            reader,
            self.inner.events_tx.clone(),
            self.inner.closed.subscribe(),
        ));
        tokio::spawn(write_lines(id, writer, rx));
        id
    }

    /// Run one processing step: apply every pending network event
    ///
    /// Returns the number of events handled.
    pub fn process_connections(&self) -> usize {
        let events: Vec<NetEvent> = {
            let mut rx = self
                .inner
                .events_rx
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::iter::from_fn(|| rx.try_recv().ok()).collect()
        };
        if events.is_empty() {
            return 0;
        }

        // Each event's callbacks run before the next event is applied
        let count = events.len();
        for event in events {
            let mut callbacks = Vec::new();
            self.state().handle_event(event, &mut callbacks);
            self.run_callbacks(callbacks);
        }
        count
    }

    fn run_callbacks(&self, callbacks: Vec<Callback>) {
        for callback in callbacks {
            match callback {
                Callback::Message { listeners, message } => {
                    for listener in listeners {
                        listener.on_message(self, &message);
                    }
                }
                Callback::Registered { listeners, client } => {
                    for listener in listeners {
                        listener.on_client(self, client);
                    }
                }
            }
        }
    }

    /// Close the transport: stop accepting, disconnect network clients
    pub fn close(&self) {
        if self.inner.closed.send_replace(true) {
            return;
        }
        let mut state = self.state();
        let real: Vec<ClientId> = state
            .clients
            .values()
            .filter(|c| c.kind() == ConnectionKind::Real)
            .map(|c| c.id)
            .collect();
        for id in real {
            state.send_to(id, "ERROR :Server shutting down");
            state.remove(id);
        }
        info!("IRC server closed");
    }

    /// Check whether the transport has been closed
    pub fn is_transport_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Wait until the transport is closed
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        let _ = rx.wait_for(|c| *c).await;
    }

    /// All registered clients, real and virtual
    pub fn clients(&self) -> Vec<ClientInfo> {
        self.state()
            .clients
            .values()
            .filter(|c| c.registered)
            .map(Client::info)
            .collect()
    }

    /// Look up a registered client by nick (case-insensitive)
    pub fn client(&self, nick: &str) -> Option<ClientInfo> {
        let state = self.state();
        let id = state.nicks.get(&fold_case(nick))?;
        state
            .clients
            .get(id)
            .filter(|c| c.registered)
            .map(Client::info)
    }

    /// Look up a client by id
    pub fn client_by_id(&self, id: ClientId) -> Option<ClientInfo> {
        self.state().clients.get(&id).map(Client::info)
    }

    /// Deregister a client
    pub fn remove_client(&self, id: ClientId) -> Option<ClientInfo> {
        self.state().remove(id)
    }

    /// Part every channel, telling channel peers `QUIT :reason`
    pub fn quit_channels(&self, id: ClientId, reason: &str) -> Result<(), IrcError> {
        self.state().quit_channels(id, reason)
    }

    /// Quit and deregister a client if `predicate` holds for it
    ///
    /// The check and the removal happen under one lock, so activity recorded
    /// after a caller's snapshot is seen by `predicate`.
    pub fn remove_client_if<F>(
        &self,
        id: ClientId,
        reason: &str,
        predicate: F,
    ) -> Option<ClientInfo>
    where
        F: FnOnce(&ClientInfo) -> bool,
    {
        let mut state = self.state();
        let info = state.clients.get(&id).map(Client::info)?;
        if !predicate(&info) {
            return None;
        }
        if let Err(e) = state.quit_channels(id, reason) {
            debug!("Failed to part {}: {}", id, e);
        }
        state.remove(id)
    }

    /// Register a channel (no-op if it exists)
    pub fn add_channel(&self, channel: Channel) {
        let mut state = self.state();
        let key = fold_case(&channel.name);
        if state.channels.contains_key(&key) {
            return;
        }
        debug!("Added channel {}", channel.name);
        state.channels.insert(key, channel);
    }

    /// Channel by name
    pub fn channel(&self, name: &str) -> Option<ChannelInfo> {
        self.state().channels.get(&fold_case(name)).map(Channel::info)
    }

    /// All channels
    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.state().channels.values().map(Channel::info).collect()
    }

    /// Be told about every PRIVMSG sent to a channel
    pub fn add_channel_listener(&self, channel: &str, listener: Arc<dyn MessageListener>) {
        self.state()
            .channel_listeners
            .entry(fold_case(channel))
            .or_default()
            .push(listener);
    }

    /// Be told about every client that completes registration
    pub fn add_connection_listener(&self, listener: Arc<dyn ClientConnectionListener>) {
        self.state().connection_listeners.push(listener);
    }

    /// Be told about every PRIVMSG a client sends
    pub fn add_client_listener(
        &self,
        id: ClientId,
        listener: Arc<dyn MessageListener>,
    ) -> Result<(), IrcError> {
        let mut state = self.state();
        if !state.clients.contains_key(&id) {
            return Err(IrcError::UnknownClient(id));
        }
        state.client_listeners.entry(id).or_default().push(listener);
        Ok(())
    }

    /// Resolve or create the virtual client for an RF station
    ///
    /// A virtual client has its activity time refreshed and joins any of
    /// `channels` it is not in yet. Fails with [`IrcError::NickInUse`] when a
    /// network client holds the nick; that client is left untouched.
    pub fn ensure_virtual_client(
        &self,
        nick: &str,
        channels: &[&str],
    ) -> Result<ClientId, IrcError> {
        if !is_valid_nick(nick) {
            return Err(IrcError::ErroneousNick(nick.to_string()));
        }

        let mut callbacks = Vec::new();
        let id = {
            let mut state = self.state();
            let now = now_millis();
            match state.nicks.get(&fold_case(nick)).copied() {
                Some(id) => {
                    match state.clients.get_mut(&id) {
                        Some(client) if client.kind() == ConnectionKind::Virtual => {
                            client.last_active = now;
                        }
                        _ => return Err(IrcError::NickInUse(nick.to_string())),
                    }
                    for channel in channels {
                        state.join(id, channel);
                    }
                    id
                }
                None => {
                    let id = self.next_client_id();
                    let mut client = Client::new_virtual(id, nick.to_string());
                    client.last_active = now;
                    state.clients.insert(id, client);
                    state.nicks.insert(fold_case(nick), id);
                    for channel in channels {
                        state.join(id, channel);
                    }
                    callbacks.push(Callback::Registered {
                        listeners: state.connection_listeners.clone(),
                        client: id,
                    });
                    info!("Created virtual client {} ({})", nick, id);
                    id
                }
            }
        };
        self.run_callbacks(callbacks);
        Ok(id)
    }

    /// Set a client's last-activity time (ms since the UNIX epoch)
    pub fn set_last_active(&self, id: ClientId, millis: u64) -> Result<(), IrcError> {
        let mut state = self.state();
        let client = state
            .clients
            .get_mut(&id)
            .ok_or(IrcError::UnknownClient(id))?;
        client.last_active = millis;
        Ok(())
    }

    /// Broadcast a PRIVMSG into a channel on behalf of `from`
    ///
    /// Listeners are not invoked; `from` need not be a member.
    pub fn send_to_channel(&self, from: &str, channel: &str, text: &str) -> Result<(), IrcError> {
        let state = self.state();
        let chan = state
            .channels
            .get(&fold_case(channel))
            .ok_or_else(|| IrcError::NoSuchChannel(channel.to_string()))?;
        let from_id = state.nicks.get(&fold_case(from)).copied();
        let line = format!(
            ":{} PRIVMSG {} :{}",
            state.prefix_for(from),
            chan.name,
            text
        );
        for member in chan.members.iter().filter(|&&m| Some(m) != from_id) {
            state.send_to(*member, line.clone());
        }
        Ok(())
    }

    /// Deliver a PRIVMSG to one nick on behalf of `from`
    pub fn send_direct(&self, from: &str, to: &str, text: &str) -> Result<(), IrcError> {
        let state = self.state();
        let target = state
            .nicks
            .get(&fold_case(to))
            .copied()
            .ok_or_else(|| IrcError::NoSuchNick(to.to_string()))?;
        let line = format!(":{} PRIVMSG {} :{}", state.prefix_for(from), to, text);
        state.send_to(target, line);
        Ok(())
    }

    /// Send a server NOTICE to a client
    pub fn notice(&self, id: ClientId, text: &str) -> Result<(), IrcError> {
        let state = self.state();
        let client = state.clients.get(&id).ok_or(IrcError::UnknownClient(id))?;
        client.send_line(format!(
            ":{} NOTICE {} :{}",
            state.config.name,
            client.nick_or_star(),
            text
        ));
        Ok(())
    }
}

async fn read_lines<R>(
    id: ClientId,
    reader: R,
    events: mpsc::UnboundedSender<NetEvent>,
    mut closed: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(MAX_LINE_LEN);
    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_READ);
        let result = tokio::select! {
            result = limited.read_until(b'\n', &mut buf) => result,
            _ = closed.wait_for(|c| *c) => break,
        };
        match result {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = truncate_line(text.trim_end_matches(['\r', '\n'])).to_string();
                if events.send(NetEvent::Line { id, line }).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Read error on {}: {}", id, e);
                break;
            }
        }
    }
    let _ = events.send(NetEvent::Closed { id });
}

async fn write_lines<W>(id: ClientId, mut writer: W, mut rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        let line = truncate_line(&line);
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\r\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            debug!("Write error on {}: {}", id, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
    debug!("Writer for {} finished", id);
}

struct ServerState {
    config: ServerConfig,
    created: u64,
    clients: BTreeMap<ClientId, Client>,
    nicks: HashMap<String, ClientId>,
    channels: BTreeMap<String, Channel>,
    channel_listeners: HashMap<String, Vec<Arc<dyn MessageListener>>>,
    client_listeners: HashMap<ClientId, Vec<Arc<dyn MessageListener>>>,
    connection_listeners: Vec<Arc<dyn ClientConnectionListener>>,
}

impl ServerState {
    fn new(config: ServerConfig) -> Self {
        Self {
            config,
            created: now_millis(),
            clients: BTreeMap::new(),
            nicks: HashMap::new(),
            channels: BTreeMap::new(),
            channel_listeners: HashMap::new(),
            client_listeners: HashMap::new(),
            connection_listeners: Vec::new(),
        }
    }

    fn handle_event(&mut self, event: NetEvent, callbacks: &mut Vec<Callback>) {
        match event {
            NetEvent::Accepted { id, addr, tx } => {
                self.clients.insert(id, Client::new_real(id, addr, tx));
            }
            NetEvent::Line { id, line } => {
                let Some(client) = self.clients.get_mut(&id) else {
                    return;
                };
                client.last_active = now_millis();
                if let Some(message) = IrcMessage::parse(&line) {
                    self.handle_command(id, message, callbacks);
                }
            }
            NetEvent::Closed { id } => {
                if self.clients.contains_key(&id) {
                    let _ = self.quit_channels(id, "Connection closed");
                    self.remove(id);
                }
            }
        }
    }

    fn send_to(&self, id: ClientId, line: impl Into<String>) {
        if let Some(client) = self.clients.get(&id) {
            client.send_line(line);
        }
    }

    fn reply(&self, id: ClientId, code: &str, text: impl AsRef<str>) {
        if let Some(client) = self.clients.get(&id) {
            client.send_line(format!(
                ":{} {} {} {}",
                self.config.name,
                code,
                client.nick_or_star(),
                text.as_ref()
            ));
        }
    }

    fn prefix_for(&self, nick: &str) -> String {
        if fold_case(nick) == fold_case(&self.config.name) {
            return self.config.name.clone();
        }
        self.nicks
            .get(&fold_case(nick))
            .and_then(|id| self.clients.get(id))
            .map(Client::prefix)
            .unwrap_or_else(|| format!("{0}!{0}@radio", nick))
    }

    /// Clients sharing at least one channel with `id`, excluding `id`
    fn peers(&self, id: ClientId) -> BTreeSet<ClientId> {
        self.channels
            .values()
            .filter(|c| c.members.contains(&id))
            .flat_map(|c| c.members.iter().copied())
            .filter(|&m| m != id)
            .collect()
    }

    fn handle_command(&mut self, id: ClientId, msg: IrcMessage, callbacks: &mut Vec<Callback>) {
        let registered = self.clients.get(&id).is_some_and(|c| c.registered);
        match msg.command.as_str() {
            "CAP" => self.cmd_cap(id, &msg),
            "NICK" => self.cmd_nick(id, &msg, callbacks),
            "USER" => self.cmd_user(id, &msg, callbacks),
            "PING" => {
                let token = msg.param(0).unwrap_or_default();
                self.send_to(
                    id,
                    format!(":{0} PONG {0} :{1}", self.config.name, token),
                );
            }
            "PONG" => {}
            "QUIT" => {
                let reason = msg.param(0).unwrap_or("Client quit").to_string();
                let _ = self.quit_channels(id, &reason);
                self.send_to(id, format!("ERROR :Closing link ({})", reason));
                self.remove(id);
            }
            _ if !registered => self.reply(id, ERR_NOTREGISTERED, ":You have not registered"),
            "JOIN" => self.cmd_join(id, &msg),
            "PART" => self.cmd_part(id, &msg),
            "PRIVMSG" | "NOTICE" => self.cmd_message(id, &msg, callbacks),
            "LIST" => self.cmd_list(id),
            "TOPIC" => self.cmd_topic(id, &msg),
            "NAMES" => self.cmd_names(id, &msg),
            "WHO" => self.cmd_who(id, &msg),
            "MODE" => self.cmd_mode(id, &msg),
            other => self.reply(id, ERR_UNKNOWNCOMMAND, format!("{} :Unknown command", other)),
        }
    }

    fn cmd_cap(&self, id: ClientId, msg: &IrcMessage) {
        // No capabilities are offered
        match msg.param(0).map(str::to_ascii_uppercase).as_deref() {
            Some("LS") | Some("LIST") => {
                self.send_to(id, format!(":{} CAP * LS :", self.config.name));
            }
            Some("REQ") => {
                let requested = msg.param(1).unwrap_or_default();
                self.send_to(
                    id,
                    format!(":{} CAP * NAK :{}", self.config.name, requested),
                );
            }
            _ => {}
        }
    }

    fn cmd_nick(&mut self, id: ClientId, msg: &IrcMessage, callbacks: &mut Vec<Callback>) {
        let Some(nick) = msg.param(0).filter(|n| !n.is_empty()) else {
            self.reply(id, ERR_NONICKNAMEGIVEN, ":No nickname given");
            return;
        };
        if !is_valid_nick(nick) {
            self.reply(id, ERR_ERRONEUSNICKNAME, format!("{} :Erroneous nickname", nick));
            return;
        }
        let key = fold_case(nick);
        let taken = match self.nicks.get(&key) {
            Some(&owner) => owner != id,
            None => key == fold_case(&self.config.name),
        };
        if taken {
            self.reply(id, ERR_NICKNAMEINUSE, format!("{} :Nickname is already in use", nick));
            return;
        }

        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        let old_prefix = client.prefix();
        let old = client.nick.replace(nick.to_string());
        let registered = client.registered;
        let ready = client.user.is_some();

        if let Some(old) = old {
            self.nicks.remove(&fold_case(&old));
        }
        self.nicks.insert(key, id);

        if registered {
            let line = format!(":{} NICK :{}", old_prefix, nick);
            self.send_to(id, line.clone());
            for peer in self.peers(id) {
                self.send_to(peer, line.clone());
            }
        } else if ready {
            self.complete_registration(id, callbacks);
        }
    }

    fn cmd_user(&mut self, id: ClientId, msg: &IrcMessage, callbacks: &mut Vec<Callback>) {
        if msg.params.len() < 4 {
            self.reply(id, ERR_NEEDMOREPARAMS, "USER :Not enough parameters");
            return;
        }
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        if client.registered {
            self.reply(id, ERR_ALREADYREGISTRED, ":You may not reregister");
            return;
        }
        client.user = Some(msg.params[0].clone());
        client.realname = msg.params[3].clone();
        if client.nick.is_some() {
            self.complete_registration(id, callbacks);
        }
    }

    fn complete_registration(&mut self, id: ClientId, callbacks: &mut Vec<Callback>) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        client.registered = true;
        let nick = client.nick_or_star().to_string();
        let name = self.config.name.clone();

        self.reply(
            id,
            RPL_WELCOME,
            format!(":Welcome to the {} packet radio gateway {}", name, nick),
        );
        self.reply(
            id,
            RPL_YOURHOST,
            format!(":Your host is {}, running version {}", name, VERSION),
        );
        self.reply(
            id,
            RPL_CREATED,
            format!(":This server was created at {} (unix ms)", self.created),
        );
        self.reply(id, RPL_MYINFO, format!("{} {} i nt", name, VERSION));

        self.reply(id, RPL_MOTDSTART, format!(":- {} Message of the day -", name));
        for line in &self.config.motd {
            self.reply(id, RPL_MOTD, format!(":- {}", line));
        }
        self.reply(id, RPL_ENDOFMOTD, ":End of /MOTD command.");

        info!("{} registered as {}", id, nick);
        callbacks.push(Callback::Registered {
            listeners: self.connection_listeners.clone(),
            client: id,
        });
    }

    /// Add a client to a channel and announce it; false if the channel is unknown
    fn join(&mut self, id: ClientId, name: &str) -> bool {
        let key = fold_case(name);
        let (Some(channel), Some(client)) =
            (self.channels.get_mut(&key), self.clients.get_mut(&id))
        else {
            return false;
        };
        if !channel.members.insert(id) {
            return true;
        }
        client.channels.insert(channel.name.clone());

        let line = format!(":{} JOIN {}", client.prefix(), channel.name);
        for member in &channel.members {
            if let Some(peer) = self.clients.get(member) {
                peer.send_line(line.clone());
            }
        }
        true
    }

    fn cmd_join(&mut self, id: ClientId, msg: &IrcMessage) {
        let Some(names) = msg.param(0) else {
            self.reply(id, ERR_NEEDMOREPARAMS, "JOIN :Not enough parameters");
            return;
        };
        if names == "0" {
            let joined: Vec<String> = self
                .clients
                .get(&id)
                .map(|c| c.channels.iter().cloned().collect())
                .unwrap_or_default();
            for name in joined {
                self.part(id, &name, "Leaving");
            }
            return;
        }

        for name in names.split(',').filter(|n| !n.is_empty()) {
            if !self.join(id, name) {
                self.reply(id, ERR_NOSUCHCHANNEL, format!("{} :No such channel", name));
                continue;
            }
            self.send_topic(id, name);
            self.send_names(id, name);
        }
    }

    fn part(&mut self, id: ClientId, name: &str, reason: &str) -> bool {
        let key = fold_case(name);
        let prefix = match self.clients.get(&id) {
            Some(client) => client.prefix(),
            None => return false,
        };
        let Some(channel) = self.channels.get_mut(&key) else {
            return false;
        };
        if !channel.members.contains(&id) {
            return false;
        }
        let line = format!(":{} PART {} :{}", prefix, channel.name, reason);
        for member in &channel.members {
            if let Some(client) = self.clients.get(member) {
                client.send_line(line.clone());
            }
        }
        channel.members.remove(&id);
        let display = channel.name.clone();
        if let Some(client) = self.clients.get_mut(&id) {
            client.channels.remove(&display);
        }
        true
    }

    fn cmd_part(&mut self, id: ClientId, msg: &IrcMessage) {
        let Some(names) = msg.param(0) else {
            self.reply(id, ERR_NEEDMOREPARAMS, "PART :Not enough parameters");
            return;
        };
        let reason = msg.param(1).unwrap_or("Leaving").to_string();
        for name in names.split(',').filter(|n| !n.is_empty()) {
            if !self.channels.contains_key(&fold_case(name)) {
                self.reply(id, ERR_NOSUCHCHANNEL, format!("{} :No such channel", name));
            } else if !self.part(id, name, &reason) {
                self.reply(
                    id,
                    ERR_NOTONCHANNEL,
                    format!("{} :You're not on that channel", name),
                );
            }
        }
    }

    fn cmd_message(&mut self, id: ClientId, msg: &IrcMessage, callbacks: &mut Vec<Callback>) {
        let notice = msg.command == "NOTICE";
        let Some(targets) = msg.param(0).filter(|t| !t.is_empty()) else {
            if !notice {
                self.reply(id, ERR_NORECIPIENT, ":No recipient given (PRIVMSG)");
            }
            return;
        };
        let Some(text) = msg.param(1).filter(|t| !t.is_empty()) else {
            if !notice {
                self.reply(id, ERR_NOTEXTTOSEND, ":No text to send");
            }
            return;
        };

        for target in targets.split(',').filter(|t| !t.is_empty()) {
            self.deliver(id, target, text, notice, callbacks);
        }
    }

    fn deliver(
        &self,
        id: ClientId,
        target: &str,
        text: &str,
        notice: bool,
        callbacks: &mut Vec<Callback>,
    ) {
        let Some(sender) = self.clients.get(&id) else {
            return;
        };
        let line = format!(
            ":{} {} {} :{}",
            sender.prefix(),
            if notice { "NOTICE" } else { "PRIVMSG" },
            target,
            text
        );

        let mut listeners = Vec::new();
        if is_channel_name(target) {
            let key = fold_case(target);
            let Some(channel) = self.channels.get(&key) else {
                if !notice {
                    self.reply(id, ERR_NOSUCHNICK, format!("{} :No such nick/channel", target));
                }
                return;
            };
            if !channel.members.contains(&id) {
                if !notice {
                    self.reply(
                        id,
                        ERR_CANNOTSENDTOCHAN,
                        format!("{} :Cannot send to channel", channel.name),
                    );
                }
                return;
            }
            for member in channel.members.iter().filter(|&&m| m != id) {
                self.send_to(*member, line.clone());
            }
            if let Some(found) = self.channel_listeners.get(&key) {
                listeners.extend(found.iter().cloned());
            }
        } else if let Some(&to) = self.nicks.get(&fold_case(target)) {
            self.send_to(to, line);
        } else {
            // Unknown nicks may be RF stations the gateway has not heard yet
            debug!("{} messaged unknown nick {}", sender.nick_or_star(), target);
        }

        if notice {
            return;
        }
        if let Some(found) = self.client_listeners.get(&id) {
            listeners.extend(found.iter().cloned());
        }
        if !listeners.is_empty() {
            callbacks.push(Callback::Message {
                listeners,
                message: ChatMessage {
                    sender: sender.nick_or_star().to_string(),
                    sender_id: id,
                    sender_kind: sender.kind(),
                    target: target.to_string(),
                    text: text.to_string(),
                },
            });
        }
    }

    fn cmd_list(&self, id: ClientId) {
        self.reply(id, RPL_LISTSTART, "Channel :Users  Name");
        for channel in self.channels.values() {
            self.reply(
                id,
                RPL_LIST,
                format!("{} {} :{}", channel.name, channel.members.len(), channel.topic),
            );
        }
        self.reply(id, RPL_LISTEND, ":End of /LIST");
    }

    fn send_topic(&self, id: ClientId, name: &str) {
        let Some(channel) = self.channels.get(&fold_case(name)) else {
            return;
        };
        if channel.topic.is_empty() {
            self.reply(id, RPL_NOTOPIC, format!("{} :No topic is set", channel.name));
        } else {
            self.reply(id, RPL_TOPIC, format!("{} :{}", channel.name, channel.topic));
        }
    }

    fn cmd_topic(&self, id: ClientId, msg: &IrcMessage) {
        let Some(name) = msg.param(0) else {
            self.reply(id, ERR_NEEDMOREPARAMS, "TOPIC :Not enough parameters");
            return;
        };
        let Some(channel) = self.channels.get(&fold_case(name)) else {
            self.reply(id, ERR_NOSUCHCHANNEL, format!("{} :No such channel", name));
            return;
        };
        if msg.params.len() > 1 {
            self.reply(
                id,
                ERR_CHANOPRIVSNEEDED,
                format!("{} :You're not channel operator", channel.name),
            );
            return;
        }
        self.send_topic(id, name);
    }

    fn send_names(&self, id: ClientId, name: &str) {
        let Some(channel) = self.channels.get(&fold_case(name)) else {
            return;
        };
        let nicks: Vec<&str> = channel
            .members
            .iter()
            .filter_map(|m| self.clients.get(m))
            .map(Client::nick_or_star)
            .collect();
        self.reply(
            id,
            RPL_NAMREPLY,
            format!("= {} :{}", channel.name, nicks.join(" ")),
        );
        self.reply(
            id,
            RPL_ENDOFNAMES,
            format!("{} :End of /NAMES list", channel.name),
        );
    }

    fn cmd_names(&self, id: ClientId, msg: &IrcMessage) {
        match msg.param(0) {
            Some(names) => {
                for name in names.split(',').filter(|n| !n.is_empty()) {
                    if self.channels.contains_key(&fold_case(name)) {
                        self.send_names(id, name);
                    } else {
                        self.reply(id, RPL_ENDOFNAMES, format!("{} :End of /NAMES list", name));
                    }
                }
            }
            None => {
                for channel in self.channels.values() {
                    self.send_names(id, &channel.name);
                }
            }
        }
    }

    fn who_line(&self, id: ClientId, context: &str, member: &Client) {
        let host = match member.kind() {
            ConnectionKind::Real => "irc",
            ConnectionKind::Virtual => "radio",
        };
        self.reply(
            id,
            RPL_WHOREPLY,
            format!(
                "{} {} {} {} {} H :0 {}",
                context,
                member.user.as_deref().unwrap_or("unknown"),
                host,
                self.config.name,
                member.nick_or_star(),
                member.realname
            ),
        );
    }

    fn cmd_who(&self, id: ClientId, msg: &IrcMessage) {
        let mask = msg.param(0).unwrap_or("*");
        if let Some(channel) = self.channels.get(&fold_case(mask)) {
            for member in channel.members.iter().filter_map(|m| self.clients.get(m)) {
                self.who_line(id, &channel.name, member);
            }
        } else if let Some(member) = self
            .nicks
            .get(&fold_case(mask))
            .and_then(|m| self.clients.get(m))
        {
            self.who_line(id, "*", member);
        }
        self.reply(id, RPL_ENDOFWHO, format!("{} :End of /WHO list", mask));
    }

    fn cmd_mode(&self, id: ClientId, msg: &IrcMessage) {
        let Some(target) = msg.param(0) else {
            self.reply(id, ERR_NEEDMOREPARAMS, "MODE :Not enough parameters");
            return;
        };
        if is_channel_name(target) {
            match self.channels.get(&fold_case(target)) {
                Some(channel) if msg.params.len() == 1 => {
                    self.reply(id, RPL_CHANNELMODEIS, format!("{} +nt", channel.name));
                }
                Some(channel) => self.reply(
                    id,
                    ERR_CHANOPRIVSNEEDED,
                    format!("{} :You're not channel operator", channel.name),
                ),
                None => {
                    self.reply(id, ERR_NOSUCHCHANNEL, format!("{} :No such channel", target))
                }
            }
        } else if self.nicks.get(&fold_case(target)) == Some(&id) {
            self.reply(id, RPL_UMODEIS, "+i");
        }
    }

    fn quit_channels(&mut self, id: ClientId, reason: &str) -> Result<(), IrcError> {
        let client = self.clients.get(&id).ok_or(IrcError::UnknownClient(id))?;
        let line = format!(":{} QUIT :{}", client.prefix(), reason);
        for peer in self.peers(id) {
            self.send_to(peer, line.clone());
        }
        for channel in self.channels.values_mut() {
            channel.members.remove(&id);
        }
        if let Some(client) = self.clients.get_mut(&id) {
            client.channels.clear();
        }
        Ok(())
    }

    fn remove(&mut self, id: ClientId) -> Option<ClientInfo> {
        let client = self.clients.remove(&id)?;
        if let Some(nick) = &client.nick {
            let key = fold_case(nick);
            if self.nicks.get(&key) == Some(&id) {
                self.nicks.remove(&key);
            }
        }
        for channel in self.channels.values_mut() {
            channel.members.remove(&id);
        }
        self.client_listeners.remove(&id);
        if client.kind() == ConnectionKind::Real {
            info!("{} ({}) disconnected", client.nick_or_star(), id);
        } else {
            debug!("Removed virtual client {} ({})", client.nick_or_star(), id);
        }
        if client.registered {
            Some(client.info())
        } else {
            debug!("{} left before registering", id);
            None
        }
    }
}
