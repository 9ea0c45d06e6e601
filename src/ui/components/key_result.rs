/// Outcome of offering a key to a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed, nothing for the parent to do
  Handled,
  /// Consumed, and the parent should act on this event
  Event(T),
  /// Not consumed, try the next handler
  NotHandled,
}
