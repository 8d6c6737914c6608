//! AMQP 0-9-1 broker client
//!
//! One connection and one channel per [`AmqpBroker`], opened on first use.
//! When TLS credentials arrive as encoded content they are materialized just
//! before the connection is opened, and the resulting [`MaterializedCerts`]
//! guard lives inside the session. Whatever ends the session (close, an
//! operation error, a failed setup, drop at shutdown) removes the files.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use amqprs::callbacks::{DefaultChannelCallback, DefaultConnectionCallback};
use amqprs::channel::{
    BasicAckArguments, BasicGetArguments, BasicNackArguments, BasicPublishArguments, Channel,
    QueueDeclareArguments,
};
use amqprs::connection::{Connection, OpenConnectionArguments};
use amqprs::tls::TlsAdaptor;
use amqprs::BasicProperties;
use async_trait::async_trait;
use pem_transport::{CertPaths, MaterializedCerts};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use super::{Broker, BrokerMessage, QueueInfo};
use crate::config::{BrokerConfig, BrokerSettings};
use crate::error::{GatewayError, Result};
use crate::tls::TlsConnector;

/// Persistent delivery mode
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// A live connection and everything that must outlive it
struct Session {
    connection: Connection,
    channel: Channel,
    certs: Option<MaterializedCerts>,
}

impl Session {
    fn is_open(&self) -> bool {
        self.connection.is_open() && self.channel.is_open()
    }

    async fn shutdown(self) {
        let Session {
            connection,
            channel,
            certs,
        } = self;

        if channel.is_open() {
            if let Err(e) = channel.close().await {
                debug!(error = %e, "Error closing channel");
            }
        }
        if connection.is_open() {
            if let Err(e) = connection.close().await {
                warn!(error = %e, "Error closing broker connection");
            }
        }
        if let Some(certs) = certs {
            if let Err(e) = certs.close() {
                warn!(error = %e, "Failed to remove certificate files");
            }
        }
    }
}

/// RabbitMQ client over amqprs
pub struct AmqpBroker {
    settings: BrokerSettings,
    cert_dir: PathBuf,
    connect_timeout: Duration,
    heartbeat: u16,
    session: Mutex<Option<Session>>,
    /// Mirrors whether `session` holds a session, readable while a connect
    /// attempt holds the lock
    connected: AtomicBool,
}

impl AmqpBroker {
    /// Create a client; no connection is opened until first use
    pub fn new(settings: BrokerSettings, config: &BrokerConfig) -> Self {
        Self {
            settings,
            cert_dir: config.cert_dir(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            heartbeat: config.heartbeat_secs,
            session: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Lock the session, connecting first if there is no open one
    async fn ensure_connected(&self) -> Result<MutexGuard<'_, Option<Session>>> {
        let mut guard = self.session.lock().await;
        if guard.as_ref().is_some_and(Session::is_open) {
            return Ok(guard);
        }

        if let Some(stale) = guard.take() {
            self.connected.store(false, Ordering::SeqCst);
            debug!("Discarding closed broker session");
            stale.shutdown().await;
        }

        let session = match tokio::time::timeout(self.connect_timeout, self.establish()).await {
            Ok(result) => result.inspect_err(|e| {
                error!(error = %e, host = %self.settings.host, "Failed to connect to broker");
            })?,
            Err(_) => {
                error!(host = %self.settings.host, "Timed out connecting to broker");
                return Err(GatewayError::Timeout(format!(
                    "connecting to {}:{} took longer than {}s",
                    self.settings.host,
                    self.settings.port,
                    self.connect_timeout.as_secs()
                )));
            }
        };

        info!(
            host = %self.settings.host,
            port = self.settings.port,
            vhost = %self.settings.vhost,
            tls = self.settings.ssl_enabled,
            "Connected to broker"
        );
        *guard = Some(session);
        self.connected.store(true, Ordering::SeqCst);
        Ok(guard)
    }

    /// Materialize certificates, build TLS and open connection and channel.
    ///
    /// Any early return drops the materialized files with it.
    async fn establish(&self) -> Result<Session> {
        let settings = &self.settings;

        let certs = if settings.ssl_enabled && !settings.content_certs().is_empty() {
            Some(MaterializedCerts::materialize(
                &self.cert_dir,
                settings.content_certs(),
            )?)
        } else {
            if !settings.ssl_enabled && settings.has_certs() {
                warn!("TLS credentials configured but ssl_enabled is false, ignoring them");
            }
            None
        };

        let mut args = OpenConnectionArguments::new(
            &settings.host,
            settings.port,
            &settings.username,
            settings.password(),
        );
        args.virtual_host(&settings.vhost).heartbeat(self.heartbeat);
        if settings.ssl_enabled {
            args.tls_adaptor(self.tls_adaptor(certs.as_ref())?);
        }

        debug!(
            host = %settings.host,
            port = settings.port,
            "Opening broker connection"
        );
        let connection = Connection::open(&args)
            .await
            .map_err(|e| GatewayError::NotConnected(e.to_string()))?;

        let channel = match open_channel(&connection).await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    debug!(error = %close_err, "Error closing half-open connection");
                }
                return Err(e);
            }
        };

        Ok(Session {
            connection,
            channel,
            certs,
        })
    }

    fn tls_adaptor(&self, certs: Option<&MaterializedCerts>) -> Result<TlsAdaptor> {
        if let Err(e) = self.settings.check_client_identity() {
            warn!(error = %e, "Connecting without client certificate");
        }

        let config = self
            .settings
            .tls_client_config(certs.map(MaterializedCerts::paths));
        let connector = TlsConnector::new(&config)?;
        Ok(TlsAdaptor::new(
            connector.into_inner(),
            self.settings.host.clone(),
        ))
    }

    /// Pass `result` through, tearing the session down on error
    async fn settle<T>(
        &self,
        guard: &mut MutexGuard<'_, Option<Session>>,
        result: Result<T>,
    ) -> Result<T> {
        if let Err(e) = &result {
            warn!(error = %e, "Broker operation failed, closing connection");
            if let Some(session) = guard.take() {
                self.connected.store(false, Ordering::SeqCst);
                session.shutdown().await;
            }
        }
        result
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn is_connected(&self) -> bool {
        // A connect attempt holds the lock for up to the connect timeout
        match self.session.try_lock() {
            Ok(guard) => guard.as_ref().is_some_and(Session::is_open),
            Err(_) => self.connected.load(Ordering::SeqCst),
        }
    }

    async fn connect(&self) -> Result<()> {
        self.ensure_connected().await.map(|_| ())
    }

    async fn publish(&self, queue: &str, message: &Value) -> Result<()> {
        let body = serde_json::to_vec(message)?;
        let mut guard = self.ensure_connected().await?;
        let result = match guard.as_ref() {
            Some(session) => declare_and_publish(&session.channel, queue, body).await,
            None => Err(not_connected()),
        };
        self.settle(&mut guard, result).await?;
        info!(queue = %queue, "Message published");
        Ok(())
    }

    async fn peek(&self, queue: &str, count: usize) -> Result<Vec<BrokerMessage>> {
        let mut guard = self.ensure_connected().await?;
        let result = match guard.as_ref() {
            Some(session) => fetch(&session.channel, queue, count, Settle::Requeue).await,
            None => Err(not_connected()),
        };
        self.settle(&mut guard, result).await
    }

    async fn consume(&self, queue: &str, count: usize) -> Result<Vec<BrokerMessage>> {
        let mut guard = self.ensure_connected().await?;
        let result = match guard.as_ref() {
            Some(session) => fetch(&session.channel, queue, count, Settle::Ack).await,
            None => Err(not_connected()),
        };
        self.settle(&mut guard, result).await
    }

    async fn queue_info(&self, queue: &str) -> Result<QueueInfo> {
        let mut guard = self.ensure_connected().await?;
        let result = match guard.as_ref() {
            Some(session) => passive_declare(&session.channel, queue).await,
            None => Err(not_connected()),
        };
        self.settle(&mut guard, result).await
    }

    async fn cert_paths(&self) -> Option<CertPaths> {
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|session| session.certs.as_ref())
            .map(|certs| certs.paths().clone())
    }

    async fn close(&self) -> Result<()> {
        if let Some(session) = self.session.lock().await.take() {
            self.connected.store(false, Ordering::SeqCst);
            session.shutdown().await;
            info!("Broker connection closed");
        }
        Ok(())
    }
}

/// What to do with fetched messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settle {
    Ack,
    Requeue,
}

fn not_connected() -> GatewayError {
    GatewayError::NotConnected("no open channel".to_string())
}

/// Map a queue-level failure, recognising the broker's 404 reply
fn queue_error(queue: &str, err: amqprs::error::Error) -> GatewayError {
    let reason = err.to_string();
    if reason.contains("NOT_FOUND") || reason.contains("404") {
        GatewayError::QueueNotFound(queue.to_string())
    } else {
        GatewayError::Broker(reason)
    }
}

async fn open_channel(connection: &Connection) -> Result<Channel> {
    connection
        .register_callback(DefaultConnectionCallback)
        .await?;
    let channel = connection.open_channel(None).await?;
    channel.register_callback(DefaultChannelCallback).await?;
    Ok(channel)
}

async fn declare_and_publish(channel: &Channel, queue: &str, body: Vec<u8>) -> Result<()> {
    channel
        .queue_declare(QueueDeclareArguments::durable_client_named(queue))
        .await?;

    let properties = BasicProperties::default()
        .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
        .with_content_type("application/json")
        .finish();
    channel
        .basic_publish(properties, body, BasicPublishArguments::new("", queue))
        .await?;
    Ok(())
}

async fn passive_declare(channel: &Channel, queue: &str) -> Result<QueueInfo> {
    let declared = channel
        .queue_declare(QueueDeclareArguments::new(queue).passive(true).finish())
        .await
        .map_err(|e| queue_error(queue, e))?;

    let (name, message_count, consumer_count) = declared
        .ok_or_else(|| GatewayError::Broker("queue declare returned no reply".to_string()))?;
    Ok(QueueInfo {
        queue: name,
        message_count,
        consumer_count,
    })
}

/// Get up to `count` messages, then settle them all.
///
/// Messages are settled only after the loop so a requeued message is not
/// fetched again by the same call.
async fn fetch(
    channel: &Channel,
    queue: &str,
    count: usize,
    settle: Settle,
) -> Result<Vec<BrokerMessage>> {
    let mut messages = Vec::with_capacity(count);
    let mut tags = Vec::with_capacity(count);

    for _ in 0..count {
        let args = BasicGetArguments::new(queue).no_ack(false).finish();
        match channel
            .basic_get(args)
            .await
            .map_err(|e| queue_error(queue, e))?
        {
            Some((get_ok, _properties, body)) => {
                tags.push(get_ok.delivery_tag());
                messages.push(BrokerMessage::from_body(&body, get_ok.redelivered()));
            }
            None => break,
        }
    }

    for tag in tags {
        match settle {
            Settle::Ack => channel.basic_ack(BasicAckArguments::new(tag, false)).await?,
            Settle::Requeue => {
                channel
                    .basic_nack(BasicNackArguments::new(tag, false, true))
                    .await?
            }
        }
    }

    debug!(queue = %queue, count = messages.len(), ?settle, "Fetched messages");
    Ok(messages)
}
