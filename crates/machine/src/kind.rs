/// The execution backend used to replay a block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum MachineKind {
    /// The full interpreter, stepping through every instruction.
    Interpreter,
    /// The just-in-time compiled backend.
    #[default]
    Jit,
}

impl MachineKind {
    /// All the machine kinds.
    pub const ALL: [Self; 2] = [Self::Interpreter, Self::Jit];
}

impl std::fmt::Display for MachineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interpreter => write!(f, "interpreter"),
            Self::Jit => write!(f, "jit"),
        }
    }
}
