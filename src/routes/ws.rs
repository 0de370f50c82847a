//! Game socket. Every client frame gets exactly one reply frame.
//! A socket drives at most one session at a time; timer-driven advances of that
//! session are pushed as `auto_advanced` messages. Closing the socket disposes
//! the session.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::logic::{self, ApiError};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::AdvanceNotice;
use crate::state::AppState;
use crate::util::trunc_for_log;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "learnplay", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

enum Incoming {
  Client(Option<Result<Message, axum::Error>>),
  Notice(AdvanceNotice),
}

/// Per-socket state: the session this socket drives, if any.
struct Connection {
  session_id: Option<String>,
  notices: mpsc::UnboundedSender<AdvanceNotice>,
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "learnplay", "WebSocket connected");
  let (tx, mut rx) = mpsc::unbounded_channel::<AdvanceNotice>();
  let mut conn = Connection { session_id: None, notices: tx };

  loop {
    let incoming = tokio::select! {
      msg = socket.recv() => Incoming::Client(msg),
      Some(notice) = rx.recv() => Incoming::Notice(notice),
    };

    let reply_msg = match incoming {
      Incoming::Client(Some(Ok(Message::Text(txt)))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(msg) => {
          debug!(target: "learnplay", raw = %trunc_for_log(&txt, 200), "WS received");
          handle_client_ws(msg, &state, &mut conn).await
        }
        Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
      },
      Incoming::Client(Some(Ok(Message::Ping(payload)))) => {
        let _ = socket.send(Message::Pong(payload)).await;
        continue;
      }
      Incoming::Client(Some(Ok(Message::Close(_))) | None | Some(Err(_))) => break,
      Incoming::Client(Some(Ok(_))) => continue,
      Incoming::Notice(notice) => {
        if conn.session_id.as_deref() != Some(notice.session_id.as_str()) {
          continue;
        }
        ServerWsMessage::AutoAdvanced { notice }
      }
    };

    let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });

    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "learnplay", error = %e, "WS send error");
      break;
    }
  }

  if let Some(id) = conn.session_id.take() {
    state.close_session(&id).await;
  }
  info!(target: "learnplay", "WebSocket disconnected");
}

fn error_msg(e: ApiError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

fn current_session(conn: &Connection) -> Result<String, ApiError> {
  conn
    .session_id
    .clone()
    .ok_or_else(|| ApiError::Conflict("No level started on this connection.".into()))
}

async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, conn: &mut Connection) -> ServerWsMessage {
  let result = dispatch(msg, state, conn).await;
  result.unwrap_or_else(error_msg)
}

async fn dispatch(msg: ClientWsMessage, state: &AppState, conn: &mut Connection) -> Result<ServerWsMessage, ApiError> {
  match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::ListCatalog => Ok(ServerWsMessage::Catalog { modules: logic::list_catalog(state) }),

    ClientWsMessage::StartLevel { module_id, level_id } => {
      let out = logic::start_session(state, &module_id, &level_id).await?;
      if let Some(old) = conn.session_id.replace(out.session_id.clone()) {
        state.close_session(&old).await;
      }
      if let Some(session) = state.get_session(&out.session_id).await {
        session.subscribe(conn.notices.clone());
      }
      info!(target: "learnplay", session = %out.session_id, %module_id, %level_id, "WS level started");
      Ok(ServerWsMessage::Session { session_id: out.session_id, view: out.view })
    }

    ClientWsMessage::SelectAnswer { answer } => {
      let id = current_session(conn)?;
      let view = logic::select_answer(state, &id, answer).await?;
      Ok(ServerWsMessage::View { view })
    }

    ClientWsMessage::SubmitAnswer => {
      let id = current_session(conn)?;
      let outcome = logic::submit_answer(state, &id).await?;
      Ok(ServerWsMessage::AnswerResult { outcome })
    }

    ClientWsMessage::Advance => {
      let id = current_session(conn)?;
      let step = logic::advance(state, &id).await?;
      Ok(ServerWsMessage::Advanced { advance: step.step, view: step.view, events: step.events })
    }

    ClientWsMessage::ContinueLevel => {
      let id = current_session(conn)?;
      let step = logic::continue_level(state, &id).await?;
      Ok(ServerWsMessage::Continued { continuation: step.step, view: step.view, events: step.events })
    }

    ClientWsMessage::RestartLevel => {
      let id = current_session(conn)?;
      let view = logic::restart_level(state, &id).await?;
      Ok(ServerWsMessage::View { view })
    }

    ClientWsMessage::Explanation { index } => {
      let id = current_session(conn)?;
      let text = logic::explanation(state, &id, index).await?;
      Ok(ServerWsMessage::Explanation { index, text })
    }

    ClientWsMessage::Exit => {
      let id = current_session(conn)?;
      conn.session_id = None;
      let intent = logic::exit_session(state, &id).await?;
      Ok(ServerWsMessage::Navigate { intent })
    }
  }
}
