use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tstouch_common::types::Pos2;

pub use self::ids::IdAllocator;
use crate::sample::Sample;

mod ids;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchEvent {
	pub id: TouchId,
	pub phase: TouchPhase,
}

impl TouchEvent {
	/// The contact position, absent for [`TouchPhase::End`].
	#[inline]
	#[must_use]
	pub fn position(&self) -> Option<Pos2> {
		match self.phase {
			TouchPhase::Begin(pos) | TouchPhase::Update(pos) => Some(pos),
			TouchPhase::End => None,
		}
	}
}

/// Identifies one contact from its begin to its end.
///
/// Identifiers come from a single counter per driver, so they are unique across slots and are not reused
/// until the counter wraps around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TouchId(pub(crate) u32);

impl TouchId {
	#[inline]
	#[must_use]
	pub const fn get(self) -> u32 {
		self.0
	}
}

impl Display for TouchId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TouchPhase {
	Begin(Pos2),
	Update(Pos2),
	End,
}

/// What a new sample does to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
	Begin,
	Update(TouchId),
	End(TouchId),
}

impl Transition {
	/// Decide the transition from the slot's current state and the incoming sample.
	///
	/// Returns `None` when the slot is idle and stays idle.
	#[inline]
	#[must_use]
	pub fn between(state: &SlotState, next: &Sample) -> Option<Self> {
		match (state.id, next.is_contact()) {
			(None, true) => Some(Self::Begin),
			(Some(id), true) => Some(Self::Update(id)),
			(Some(id), false) => Some(Self::End(id)),
			(None, false) => None,
		}
	}
}

/// The last sample seen for one slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotState {
	last: Sample,
	/// Invariant: `id.is_some() == last.is_contact()`.
	id: Option<TouchId>,
}

impl SlotState {
	#[inline]
	#[must_use]
	pub fn last(&self) -> Sample {
		self.last
	}

	#[inline]
	#[must_use]
	pub fn id(&self) -> Option<TouchId> {
		self.id
	}

	#[inline]
	#[must_use]
	pub fn is_active(&self) -> bool {
		self.id.is_some()
	}
}

/// One [`SlotState`] per contact slot, all starting idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTable<const N: usize> {
	states: [SlotState; N],
}

impl<const N: usize> Default for SlotTable<N> {
	fn default() -> Self {
		Self {
			states: [SlotState::default(); N],
		}
	}
}

impl<const N: usize> SlotTable<N> {
	#[inline]
	#[must_use]
	pub fn get(&self, slot: usize) -> Option<SlotState> {
		self.states.get(slot).copied()
	}

	/// Is `id` held by any active slot?
	#[inline]
	#[must_use]
	pub fn holds(&self, id: TouchId) -> bool {
		self.active().any(|(_, held)| held == id)
	}

	/// The slots currently holding a contact, with their identifiers.
	pub fn active(&self) -> impl Iterator<Item = (usize, TouchId)> + '_ {
		self.states
			.iter()
			.enumerate()
			.filter_map(|(slot, state)| Some((slot, state.id?)))
	}

	/// Feed `sample` to `slot` and commit it as the slot's new state.
	///
	/// `allocate` is called with the table as it was before this sample, only on a begin.
	/// Out-of-range slots are ignored.
	pub(crate) fn apply(
		&mut self,
		slot: usize,
		sample: Sample,
		allocate: impl FnOnce(&Self) -> TouchId,
	) -> Option<TouchEvent> {
		let state = self.get(slot)?;

		let event = Transition::between(&state, &sample).map(|transition| match transition {
			Transition::Begin => TouchEvent {
				id: allocate(&*self),
				phase: TouchPhase::Begin(sample.pos),
			},
			Transition::Update(id) => TouchEvent {
				id,
				phase: TouchPhase::Update(sample.pos),
			},
			Transition::End(id) => TouchEvent {
				id,
				phase: TouchPhase::End,
			},
		});

		let id = match event {
			Some(TouchEvent {
				phase: TouchPhase::End,
				..
			})
			| None => None,
			Some(event) => Some(event.id),
		};
		self.states[slot] = SlotState { last: sample, id };

		event
	}
}
