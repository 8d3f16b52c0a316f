// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::io;
use std::net::TcpListener;

/// Source of host ports to bake into a manifest before it is rendered.
pub trait HostPortSource: Send + Sync {
    fn free_port(&self) -> io::Result<u16>;
}

/// Asks the OS for an unused port by binding port 0 and releasing it.
///
/// The port is free at the time of the call only; the engine binds it later.
#[derive(Debug, Default, Clone, Copy)]
pub struct EphemeralPorts;

impl HostPortSource for EphemeralPorts {
    fn free_port(&self) -> io::Result<u16> {
        let listener = TcpListener::bind(("0.0.0.0", 0))?;
        Ok(listener.local_addr()?.port())
    }
}

/// Keep a caller-pinned port, otherwise allocate one.
pub fn resolve_port(source: &dyn HostPortSource, requested: u16) -> io::Result<u16> {
    if requested != 0 {
        return Ok(requested);
    }
    source.free_port()
}
