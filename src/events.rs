use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Customer events
    CustomerRegistered(Uuid),
    CustomerUpdated(Uuid),

    // Cart events
    CartItemAdded { customer_id: Uuid, item_id: Uuid },
    CartItemUpdated { customer_id: Uuid, item_id: Uuid },
    CartItemRemoved { customer_id: Uuid, item_id: Uuid },
    CartCleared(Uuid),

    // Checkout events
    CheckoutSessionCreated {
        customer_id: Uuid,
        session_id: String,
    },
    PaymentConfirmed {
        session_id: String,
    },

    // Order events
    OrderCreated(Uuid),
    OrderAlreadyMaterialized {
        session_id: String,
        order_id: Uuid,
    },
    InventoryDecremented {
        item_id: Uuid,
        quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the receiver is
    /// gone. A full channel makes `send` wait, it does not error.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Drains the event channel and logs each event. The channel keeps the
/// services decoupled from whatever downstream consumers exist.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created");
            }
            Event::OrderAlreadyMaterialized {
                session_id,
                order_id,
            } => {
                info!(
                    session_id = %session_id,
                    order_id = %order_id,
                    "Duplicate materialization collapsed to existing order"
                );
            }
            Event::PaymentConfirmed { session_id } => {
                info!(session_id = %session_id, "Payment confirmed");
            }
            other => {
                info!(event = ?other, "Event");
            }
        }
    }

    info!("Event channel closed; stopping event processing loop");
}
