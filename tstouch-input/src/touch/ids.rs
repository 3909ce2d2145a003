use crate::touch::TouchId;

/// Hands out touch identifiers from one counter shared by every slot of a driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdAllocator {
	next: u32,
}

impl IdAllocator {
	#[inline]
	#[must_use]
	pub const fn new() -> Self {
		Self { next: 0 }
	}

	#[cfg(test)]
	pub(crate) const fn starting_at(next: u32) -> Self {
		Self { next }
	}

	/// Take the next identifier not claimed by `in_use`.
	///
	/// The counter wraps to 0 after `u32::MAX`.
	/// Identifiers that are still held by an active contact are skipped, so this only loops more than once right after a wrap.
	pub fn allocate(&mut self, mut in_use: impl FnMut(TouchId) -> bool) -> TouchId {
		loop {
			let id = TouchId(self.next);
			self.next = self.next.wrapping_add(1);
			if self.next == 0 {
				tracing::debug!("touch id counter wrapped around");
			}
			if !in_use(id) {
				return id;
			}
		}
	}
}

#[test]
fn test_sequential() {
	let mut ids = IdAllocator::new();
	assert_eq!(ids.allocate(|_| false), TouchId(0));
	assert_eq!(ids.allocate(|_| false), TouchId(1));
	assert_eq!(ids.allocate(|_| false), TouchId(2));
}

#[test]
fn test_wrap_skips_live_ids() {
	let mut ids = IdAllocator::starting_at(u32::MAX);
	let live = [TouchId(0), TouchId(1), TouchId(3)];

	assert_eq!(ids.allocate(|id| live.contains(&id)), TouchId(u32::MAX));
	assert_eq!(ids.allocate(|id| live.contains(&id)), TouchId(2));
	assert_eq!(ids.allocate(|id| live.contains(&id)), TouchId(4));
}
