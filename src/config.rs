//! Configuration for framenet
//!
//! Centralized configuration with sensible defaults. A `NetConfig` is owned by
//! the `ConnectionManager`; readers, writers and connections created through
//! that manager take their defaults from it.

use std::time::Duration;

use crate::framing::HeaderWidth;

/// Main configuration for a connection manager and everything attached to it
#[derive(Debug, Clone)]
pub struct NetConfig {
    // -------------------------------------------------------------------------
    // Framing Configuration
    // -------------------------------------------------------------------------
    /// Width of the TCP length header used by new readers and writers
    pub tcp_header_size: HeaderWidth,

    /// Largest UDP payload a writer will accept (bytes, excluding the header)
    pub max_udp_datagram: usize,

    /// Largest TCP frame a reader will accept; a longer header drops the socket
    pub max_tcp_datagram: usize,

    /// Read buffer for raw-mode TCP receives
    pub raw_read_size: usize,

    // -------------------------------------------------------------------------
    // Reader Configuration
    // -------------------------------------------------------------------------
    /// Upper bound on one multiplex wait before the loop rechecks shutdown
    pub poll_timeout: Duration,

    /// Readiness events collected per wait
    pub max_events: usize,

    // -------------------------------------------------------------------------
    // Queue Configuration
    // -------------------------------------------------------------------------
    /// Capacity of a threaded writer's outbound queue
    pub max_write_queue: usize,

    /// Capacity of the queued consumers' result FIFOs
    pub max_queue_size: usize,

    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Batch small TCP writes on new connections
    pub collect_tcp: bool,

    /// How long batched TCP writes may sit before being flushed
    pub collect_tcp_interval: Duration,

    /// Default timeout for outgoing TCP connects
    pub connect_timeout: Duration,

    // -------------------------------------------------------------------------
    // Error Handling
    // -------------------------------------------------------------------------
    /// Abort the process on unexpected (non-reset, non-transient) socket errors
    pub abort_on_error: bool,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            tcp_header_size: HeaderWidth::U16,
            max_udp_datagram: 8192,
            max_tcp_datagram: 16 * 1024 * 1024,
            raw_read_size: 8192,
            poll_timeout: Duration::from_millis(100),
            max_events: 128,
            max_write_queue: 10_000,
            max_queue_size: 10_000,
            collect_tcp: false,
            collect_tcp_interval: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(5),
            abort_on_error: false,
        }
    }
}

impl NetConfig {
    /// Create a new config builder
    pub fn builder() -> NetConfigBuilder {
        NetConfigBuilder::default()
    }
}

/// Builder for NetConfig
#[derive(Default)]
pub struct NetConfigBuilder {
    config: NetConfig,
}

impl NetConfigBuilder {
    /// Set the default TCP header width
    pub fn tcp_header_size(mut self, width: HeaderWidth) -> Self {
        self.config.tcp_header_size = width;
        self
    }

    /// Set the maximum UDP payload size (in bytes)
    pub fn max_udp_datagram(mut self, size: usize) -> Self {
        self.config.max_udp_datagram = size;
        self
    }

    /// Set the largest TCP frame readers will accept (in bytes)
    pub fn max_tcp_datagram(mut self, size: usize) -> Self {
        self.config.max_tcp_datagram = size;
        self
    }

    /// Set the raw-mode TCP read buffer size (in bytes)
    pub fn raw_read_size(mut self, size: usize) -> Self {
        self.config.raw_read_size = size.max(1);
        self
    }

    /// Set the bound on a single multiplex wait
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    /// Set how many readiness events one wait may collect
    pub fn max_events(mut self, count: usize) -> Self {
        self.config.max_events = count.max(1);
        self
    }

    /// Set the writer queue capacity
    pub fn max_write_queue(mut self, count: usize) -> Self {
        self.config.max_write_queue = count;
        self
    }

    /// Set the queued-consumer FIFO capacity
    pub fn max_queue_size(mut self, count: usize) -> Self {
        self.config.max_queue_size = count;
        self
    }

    /// Enable or disable TCP write collection on new connections
    pub fn collect_tcp(mut self, enabled: bool) -> Self {
        self.config.collect_tcp = enabled;
        self
    }

    /// Set the TCP write collection flush interval
    pub fn collect_tcp_interval(mut self, interval: Duration) -> Self {
        self.config.collect_tcp_interval = interval;
        self
    }

    /// Set the default TCP connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Abort on unexpected socket errors instead of logging them
    pub fn abort_on_error(mut self, enabled: bool) -> Self {
        self.config.abort_on_error = enabled;
        self
    }

    pub fn build(self) -> NetConfig {
        self.config
    }
}
