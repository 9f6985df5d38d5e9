// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The UDP/TCP wire front-end.
//!
//! Parses incoming messages, routes the first question through the
//! [`Dispatcher`](super::Dispatcher) and frames the response. Each query is
//! handled in its own task. Malformed datagrams are dropped; a fall-through
//! outcome is answered with REFUSED, since a standalone server has no next
//! handler. Oversized UDP responses are truncated to the header with the TC
//! flag set so clients retry over TCP.

use crate::constants::MAX_UDP_RESPONSE_BYTES;
use crate::server::{Dispatcher, QueryOutcome};
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, error, info, warn};

/// The DNS wire front-end.
pub struct DnsFrontend {
    dispatcher: Arc<Dispatcher>,
    addr: SocketAddr,
}

impl DnsFrontend {
    /// Create a front-end serving the given address over UDP and TCP.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, addr: SocketAddr) -> Self {
        DnsFrontend { dispatcher, addr }
    }

    /// Bind and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when binding either socket fails.
    pub async fn run(&self) -> std::io::Result<()> {
        let udp = Arc::new(UdpSocket::bind(self.addr).await?);
        let tcp = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "DNS server listening");

        let udp_task = {
            let socket = Arc::clone(&udp);
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move { serve_udp(socket, dispatcher).await })
        };
        let tcp_task = {
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move { serve_tcp(tcp, dispatcher).await })
        };

        let _ = tokio::try_join!(udp_task, tcp_task);
        Ok(())
    }
}

async fn serve_udp(socket: Arc<UdpSocket>, dispatcher: Arc<Dispatcher>) {
    let mut buf = vec![0u8; 4096];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                let data = buf[..len].to_vec();
                let socket = Arc::clone(&socket);
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    if let Some(mut response) = respond(&dispatcher, &data) {
                        if response.len() > MAX_UDP_RESPONSE_BYTES {
                            response = truncate(&data).unwrap_or(response);
                        }
                        if let Err(e) = socket.send_to(&response, src).await {
                            debug!(error = %e, client = %src, "failed to send UDP response");
                        }
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "error receiving UDP packet");
            }
        }
    }
}

async fn serve_tcp(listener: TcpListener, dispatcher: Arc<Dispatcher>) {
    loop {
        match listener.accept().await {
            Ok((mut stream, src)) => {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    loop {
                        let mut len_buf = [0u8; 2];
                        if stream.read_exact(&mut len_buf).await.is_err() {
                            return;
                        }
                        let len = usize::from(u16::from_be_bytes(len_buf));
                        let mut data = vec![0u8; len];
                        if stream.read_exact(&mut data).await.is_err() {
                            return;
                        }
                        let Some(response) = respond(&dispatcher, &data) else {
                            return;
                        };
                        let frame_len = match u16::try_from(response.len()) {
                            Ok(l) => l,
                            Err(_) => {
                                warn!(client = %src, "response too large for TCP frame");
                                return;
                            }
                        };
                        if stream.write_all(&frame_len.to_be_bytes()).await.is_err()
                            || stream.write_all(&response).await.is_err()
                        {
                            return;
                        }
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "error accepting TCP connection");
            }
        }
    }
}

/// Handle one wire message, returning the encoded response. Malformed
/// queries yield `None` and are dropped.
#[must_use]
pub fn respond(dispatcher: &Dispatcher, data: &[u8]) -> Option<Vec<u8>> {
    let request = match Message::from_vec(data) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "failed to parse DNS query");
            return None;
        }
    };
    if request.message_type() != MessageType::Query || request.op_code() != OpCode::Query {
        return encode(error_response(&request, ResponseCode::NotImp));
    }
    let Some(query) = request.queries().first().cloned() else {
        return encode(error_response(&request, ResponseCode::FormErr));
    };

    let qname = query.name().to_string();
    let outcome = dispatcher.handle_query(&qname, query.query_type());

    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(false);
    response.add_query(query);

    match outcome {
        QueryOutcome::Answer(answer) => {
            response.set_authoritative(answer.authoritative);
            response.set_response_code(answer.rcode);
            response.insert_answers(answer.answers);
            response.insert_name_servers(answer.authorities);
            response.insert_additionals(answer.extras);
        }
        QueryOutcome::Fallthrough => {
            // no next handler in the standalone server
            response.set_authoritative(false);
            response.set_response_code(ResponseCode::Refused);
        }
    }
    encode(response)
}

fn error_response(request: &Message, rcode: ResponseCode) -> Message {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(request.op_code());
    response.set_response_code(rcode);
    response
}

/// A header-only truncated copy of the query, for oversized UDP answers.
fn truncate(query: &[u8]) -> Option<Vec<u8>> {
    let request = Message::from_vec(query).ok()?;
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_truncated(true);
    response.set_response_code(ResponseCode::NoError);
    if let Some(query) = request.queries().first() {
        response.add_query(query.clone());
    }
    encode(response)
}

fn encode(message: Message) -> Option<Vec<u8>> {
    match message.to_vec() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!(error = %e, "failed to encode DNS response");
            None
        }
    }
}

#[cfg(test)]
#[path = "frontend_tests.rs"]
mod frontend_tests;
