/// Headphone output stage with runtime control (e.g. an amplifier with a
/// digital volume register).
pub trait OutputControl {
    /// Error type for bus transactions.
    type Error;

    /// Bring the output out of shutdown.
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Put the output into shutdown.
    fn disable(&mut self) -> Result<(), Self::Error>;

    /// Set the volume step (0 = quietest, 31 = loudest; higher bits ignored).
    fn volume(&mut self, level: u8) -> Result<(), Self::Error>;

    /// Select the high gain range.
    fn max_gain(&mut self, enabled: bool) -> Result<(), Self::Error>;

    /// Select the boosted bass response.
    fn bass_max(&mut self, enabled: bool) -> Result<(), Self::Error>;
}
