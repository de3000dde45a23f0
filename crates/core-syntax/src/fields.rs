//! Field class taxonomy.
//!
//! Names are stable identifiers shared between tokenizers, themes, and the
//! renderer. Unrecognized names fall back to the default entry rather than
//! failing, so profiles and themes may evolve independently.

/// Classification of one isolated field of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldClass {
    // Whitespace classes.
    Indentation,
    IndentationOnly,
    TrailingWhitespace,
    LineTermination,

    // Code inclusion classes.
    InclusionIdentifier,
    InclusionKeyword,
    InclusionCoreword,
    InclusionMetaword,
    InclusionProjectword,
    InclusionHighlight,
    InclusionOperation,
    InclusionRouter,
    InclusionTerminator,
    InclusionStartEnclosure,
    InclusionStopEnclosure,
    InclusionSpace,
    InclusionFragment,
    InclusionStopExclusion,
    InclusionStopLiteral,

    // Comments.
    ExclusionStart,
    ExclusionStop,
    ExclusionDelimit,
    ExclusionWords,
    ExclusionSpace,
    ExclusionFragment,

    // String literals.
    LiteralStart,
    LiteralStop,
    LiteralDelimit,
    LiteralWords,
    LiteralSpace,
    LiteralFragment,

    // Ephemera.
    FieldAnnotationStart,
    FieldAnnotationTitle,
    FieldAnnotationSeparator,
    FieldAnnotationStop,
    ErrorCondition,
    Warning,

    // Filesystem classes for location views.
    PathSeparator,
    PathDirectory,
    PathLink,
    PathEmpty,
    FilesystemRoot,
    Directory,
    Executable,
    Data,
    DotFile,
    FileNotFound,
    Link,
    Device,
    Socket,
    Pipe,
    Relatives,
    Void,

    /// Fallback for unrecognized names.
    Default,
}

impl FieldClass {
    /// The stable identifier.
    pub fn name(&self) -> &'static str {
        use FieldClass::*;
        match self {
            Indentation => "indentation",
            IndentationOnly => "indentation-only",
            TrailingWhitespace => "trailing-whitespace",
            LineTermination => "line-termination",
            InclusionIdentifier => "inclusion-identifier",
            InclusionKeyword => "inclusion-keyword",
            InclusionCoreword => "inclusion-coreword",
            InclusionMetaword => "inclusion-metaword",
            InclusionProjectword => "inclusion-projectword",
            InclusionHighlight => "inclusion-highlight",
            InclusionOperation => "inclusion-operation",
            InclusionRouter => "inclusion-router",
            InclusionTerminator => "inclusion-terminator",
            InclusionStartEnclosure => "inclusion-start-enclosure",
            InclusionStopEnclosure => "inclusion-stop-enclosure",
            InclusionSpace => "inclusion-space",
            InclusionFragment => "inclusion-fragment",
            InclusionStopExclusion => "inclusion-stop-exclusion",
            InclusionStopLiteral => "inclusion-stop-literal",
            ExclusionStart => "exclusion-start",
            ExclusionStop => "exclusion-stop",
            ExclusionDelimit => "exclusion-delimit",
            ExclusionWords => "exclusion-words",
            ExclusionSpace => "exclusion-space",
            ExclusionFragment => "exclusion-fragment",
            LiteralStart => "literal-start",
            LiteralStop => "literal-stop",
            LiteralDelimit => "literal-delimit",
            LiteralWords => "literal-words",
            LiteralSpace => "literal-space",
            LiteralFragment => "literal-fragment",
            FieldAnnotationStart => "field-annotation-start",
            FieldAnnotationTitle => "field-annotation-title",
            FieldAnnotationSeparator => "field-annotation-separator",
            FieldAnnotationStop => "field-annotation-stop",
            ErrorCondition => "error-condition",
            Warning => "warning",
            PathSeparator => "path-separator",
            PathDirectory => "path-directory",
            PathLink => "path-link",
            PathEmpty => "path-empty",
            FilesystemRoot => "filesystem-root",
            Directory => "directory",
            Executable => "executable",
            Data => "data",
            DotFile => "dot-file",
            FileNotFound => "file-not-found",
            Link => "link",
            Device => "device",
            Socket => "socket",
            Pipe => "pipe",
            Relatives => "relatives",
            Void => "void",
            Default => "default",
        }
    }

    /// Resolve a stable identifier; unknown names map to `Default`.
    pub fn parse(name: &str) -> FieldClass {
        use FieldClass::*;
        match name {
            "indentation" => Indentation,
            "indentation-only" => IndentationOnly,
            "trailing-whitespace" => TrailingWhitespace,
            "line-termination" => LineTermination,
            "inclusion-identifier" => InclusionIdentifier,
            "inclusion-keyword" => InclusionKeyword,
            "inclusion-coreword" => InclusionCoreword,
            "inclusion-metaword" => InclusionMetaword,
            "inclusion-projectword" => InclusionProjectword,
            "inclusion-highlight" => InclusionHighlight,
            "inclusion-operation" => InclusionOperation,
            "inclusion-router" => InclusionRouter,
            "inclusion-terminator" => InclusionTerminator,
            "inclusion-start-enclosure" => InclusionStartEnclosure,
            "inclusion-stop-enclosure" => InclusionStopEnclosure,
            "inclusion-space" => InclusionSpace,
            "inclusion-fragment" => InclusionFragment,
            "inclusion-stop-exclusion" => InclusionStopExclusion,
            "inclusion-stop-literal" => InclusionStopLiteral,
            "exclusion-start" => ExclusionStart,
            "exclusion-stop" => ExclusionStop,
            "exclusion-delimit" => ExclusionDelimit,
            "exclusion-words" => ExclusionWords,
            "exclusion-space" => ExclusionSpace,
            "exclusion-fragment" => ExclusionFragment,
            "literal-start" => LiteralStart,
            "literal-stop" => LiteralStop,
            "literal-delimit" => LiteralDelimit,
            "literal-words" => LiteralWords,
            "literal-space" => LiteralSpace,
            "literal-fragment" => LiteralFragment,
            "field-annotation-start" => FieldAnnotationStart,
            "field-annotation-title" => FieldAnnotationTitle,
            "field-annotation-separator" => FieldAnnotationSeparator,
            "field-annotation-stop" => FieldAnnotationStop,
            "error-condition" => ErrorCondition,
            "warning" => Warning,
            "path-separator" => PathSeparator,
            "path-directory" => PathDirectory,
            "path-link" => PathLink,
            "path-empty" => PathEmpty,
            "filesystem-root" => FilesystemRoot,
            "directory" => Directory,
            "executable" => Executable,
            "data" => Data,
            "dot-file" => DotFile,
            "file-not-found" => FileNotFound,
            "link" => Link,
            "device" => Device,
            "socket" => Socket,
            "pipe" => Pipe,
            "relatives" => Relatives,
            "void" => Void,
            _ => Default,
        }
    }

    /// Whether the class belongs to the inclusion context.
    pub fn is_inclusion(&self) -> bool {
        self.name().starts_with("inclusion-")
    }

    pub fn is_exclusion(&self) -> bool {
        self.name().starts_with("exclusion-")
    }

    pub fn is_literal(&self) -> bool {
        self.name().starts_with("literal-")
    }
}

/// One isolated field: its class and text.
pub type Field = (FieldClass, String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_parse_round_trip() {
        for fc in [
            FieldClass::Indentation,
            FieldClass::InclusionKeyword,
            FieldClass::ExclusionWords,
            FieldClass::LiteralStop,
            FieldClass::ErrorCondition,
            FieldClass::PathSeparator,
        ] {
            assert_eq!(FieldClass::parse(fc.name()), fc);
        }
    }

    #[test]
    fn unknown_names_fall_back() {
        assert_eq!(FieldClass::parse("no-such-class"), FieldClass::Default);
    }

    #[test]
    fn context_predicates() {
        assert!(FieldClass::InclusionSpace.is_inclusion());
        assert!(FieldClass::ExclusionStart.is_exclusion());
        assert!(FieldClass::LiteralWords.is_literal());
        assert!(!FieldClass::Indentation.is_inclusion());
    }
}
