/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread that receives events emitted by the consensus core and passes them to event handlers.
//!
//! When the thread receives a message containing an [event](crate::events::Event), it triggers the
//! execution of all handlers defined for the contained event type, where the handlers for each
//! event type are stored in [`EventHandlers`].
//!
//! ## Event Handlers
//!
//! An instance of `EventHandlers` contains:
//! 1. The handlers provided by the surrounding system, and
//! 2. If logging is enabled, the default logging handlers defined in [logging](crate::logging).

use std::{
    sync::mpsc::{Receiver, TryRecvError},
    thread,
    thread::JoinHandle,
};

use crate::{events::*, logging::Logger};

/// Pointer to a handler closure, parametrised by the argument (for our use case, event) type.
pub type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// Stores the two optional handlers enabled for an event type that implements the [`Logger`]
/// trait, namely one logging handler, defined in [`logging`](crate::logging), and one
/// user-defined handler.
pub(crate) struct HandlerPair<T: Logger> {
    pub(crate) user_defined_handler: Option<HandlerPtr<T>>,
    pub(crate) logging_handler: Option<HandlerPtr<T>>,
}

impl<T: Logger> HandlerPair<T> {
    // Checks if no event handlers are defined for this event.
    fn is_empty(&self) -> bool {
        self.user_defined_handler.is_none() && self.logging_handler.is_none()
    }

    /// Creates a new `HandlerPair` with the user-defined handler, and the default logging handler
    /// if logging is enabled.
    fn new(log: bool, user_defined_handler: Option<HandlerPtr<T>>) -> HandlerPair<T> {
        HandlerPair {
            user_defined_handler,
            logging_handler: if log { Some(T::get_logger()) } else { None },
        }
    }

    fn fire(&self, event: &T) {
        if let Some(handler) = &self.user_defined_handler {
            handler(event)
        }
        if let Some(handler) = &self.logging_handler {
            handler(event)
        }
    }
}

/// Stores the `HandlerPair` of user-defined and optional logging handlers for each pre-defined
/// event type from [events](crate::events).
pub struct EventHandlers {
    pub(crate) deliver_block_handlers: HandlerPair<DeliverBlockEvent>,
    pub(crate) commit_block_handlers: HandlerPair<CommitBlockEvent>,
    pub(crate) prune_block_handlers: HandlerPair<PruneBlockEvent>,
    pub(crate) update_highest_qc_handlers: HandlerPair<UpdateHighestQCEvent>,
    pub(crate) update_locked_block_handlers: HandlerPair<UpdateLockedBlockEvent>,

    pub(crate) propose_handlers: HandlerPair<ProposeEvent>,
    pub(crate) vote_handlers: HandlerPair<VoteEvent>,
    pub(crate) send_local_order_handlers: HandlerPair<SendLocalOrderEvent>,

    pub(crate) receive_proposal_handlers: HandlerPair<ReceiveProposalEvent>,
    pub(crate) receive_vote_handlers: HandlerPair<ReceiveVoteEvent>,
    pub(crate) receive_local_order_handlers: HandlerPair<ReceiveLocalOrderEvent>,

    pub(crate) collect_qc_handlers: HandlerPair<CollectQCEvent>,
    pub(crate) decide_handlers: HandlerPair<DecideEvent>,
}

impl EventHandlers {
    /// Creates the [handler pairs](HandlerPair) for all pre-defined event types given the
    /// user-defined handlers, and information on whether logging is enabled.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        log: bool,
        deliver_block_handler: Option<HandlerPtr<DeliverBlockEvent>>,
        commit_block_handler: Option<HandlerPtr<CommitBlockEvent>>,
        prune_block_handler: Option<HandlerPtr<PruneBlockEvent>>,
        update_highest_qc_handler: Option<HandlerPtr<UpdateHighestQCEvent>>,
        update_locked_block_handler: Option<HandlerPtr<UpdateLockedBlockEvent>>,
        propose_handler: Option<HandlerPtr<ProposeEvent>>,
        vote_handler: Option<HandlerPtr<VoteEvent>>,
        send_local_order_handler: Option<HandlerPtr<SendLocalOrderEvent>>,
        receive_proposal_handler: Option<HandlerPtr<ReceiveProposalEvent>>,
        receive_vote_handler: Option<HandlerPtr<ReceiveVoteEvent>>,
        receive_local_order_handler: Option<HandlerPtr<ReceiveLocalOrderEvent>>,
        collect_qc_handler: Option<HandlerPtr<CollectQCEvent>>,
        decide_handler: Option<HandlerPtr<DecideEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            deliver_block_handlers: HandlerPair::new(log, deliver_block_handler),
            commit_block_handlers: HandlerPair::new(log, commit_block_handler),
            prune_block_handlers: HandlerPair::new(log, prune_block_handler),
            update_highest_qc_handlers: HandlerPair::new(log, update_highest_qc_handler),
            update_locked_block_handlers: HandlerPair::new(log, update_locked_block_handler),
            propose_handlers: HandlerPair::new(log, propose_handler),
            vote_handlers: HandlerPair::new(log, vote_handler),
            send_local_order_handlers: HandlerPair::new(log, send_local_order_handler),
            receive_proposal_handlers: HandlerPair::new(log, receive_proposal_handler),
            receive_vote_handlers: HandlerPair::new(log, receive_vote_handler),
            receive_local_order_handlers: HandlerPair::new(log, receive_local_order_handler),
            collect_qc_handlers: HandlerPair::new(log, collect_qc_handler),
            decide_handlers: HandlerPair::new(log, decide_handler),
        }
    }

    /// Creates an `EventHandlers` with no user-defined handlers and only the default logging
    /// handlers.
    pub fn logging_only() -> EventHandlers {
        EventHandlers::new(
            true, None, None, None, None, None, None, None, None, None, None, None, None, None,
        )
    }

    /// Checks if no handlers are defined, i.e., neither user-defined handlers were defined nor
    /// logging is enabled.
    pub fn is_empty(&self) -> bool {
        self.deliver_block_handlers.is_empty()
            && self.commit_block_handlers.is_empty()
            && self.prune_block_handlers.is_empty()
            && self.update_highest_qc_handlers.is_empty()
            && self.update_locked_block_handlers.is_empty()
            && self.propose_handlers.is_empty()
            && self.vote_handlers.is_empty()
            && self.send_local_order_handlers.is_empty()
            && self.receive_proposal_handlers.is_empty()
            && self.receive_vote_handlers.is_empty()
            && self.receive_local_order_handlers.is_empty()
            && self.collect_qc_handlers.is_empty()
            && self.decide_handlers.is_empty()
    }

    /// Triggers the execution of each of the two handlers - the user-defined and the logging
    /// handler, if defined - for a given event type from [events](crate::events).
    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::DeliverBlock(ev) => self.deliver_block_handlers.fire(&ev),
            Event::CommitBlock(ev) => self.commit_block_handlers.fire(&ev),
            Event::PruneBlock(ev) => self.prune_block_handlers.fire(&ev),
            Event::UpdateHighestQC(ev) => self.update_highest_qc_handlers.fire(&ev),
            Event::UpdateLockedBlock(ev) => self.update_locked_block_handlers.fire(&ev),
            Event::Propose(ev) => self.propose_handlers.fire(&ev),
            Event::Vote(ev) => self.vote_handlers.fire(&ev),
            Event::SendLocalOrder(ev) => self.send_local_order_handlers.fire(&ev),
            Event::ReceiveProposal(ev) => self.receive_proposal_handlers.fire(&ev),
            Event::ReceiveVote(ev) => self.receive_vote_handlers.fire(&ev),
            Event::ReceiveLocalOrder(ev) => self.receive_local_order_handlers.fire(&ev),
            Event::CollectQC(ev) => self.collect_qc_handlers.fire(&ev),
            Event::Decide(ev) => self.decide_handlers.fire(&ev),
        }
    }
}

/// Starts the event bus thread, which runs an infinite loop until a shutdown signal is received
/// from the parent thread. In each iteration of the loop, the thread checks if it received any
/// event notifications, and if so, then triggers the execution of the handlers defined for the
/// event.
pub fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        match event_subscriber.try_recv() {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(TryRecvError::Empty) => thread::yield_now(),
            Err(TryRecvError::Disconnected) => return,
        }
    })
}
