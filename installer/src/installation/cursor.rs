// Installation cursor
//
// Position of one attempt in the plan. Only advanced by successful (or skipped) files and by
// exhausting a sub-version or version; a retried file keeps its position. A restart builds a new
// cursor instead of rewinding this one.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallationCursor {
    pub version_index: usize,
    pub sub_version_index: usize,
    pub file_index: usize,
    pub carry_on: bool,
}

impl InstallationCursor {
    pub fn start() -> Self {
        Self {
            version_index: 0,
            sub_version_index: 0,
            file_index: 0,
            carry_on: true,
        }
    }

    pub fn advance_file(&mut self) {
        self.file_index += 1;
    }

    pub fn next_sub_version(&mut self) {
        self.sub_version_index += 1;
        self.file_index = 0;
    }

    pub fn next_version(&mut self) {
        self.version_index += 1;
        self.sub_version_index = 0;
        self.file_index = 0;
    }

    pub fn stop(&mut self) {
        self.carry_on = false;
    }

    /// (version, sub-version) the cursor is inside.
    pub fn unit(&self) -> (usize, usize) {
        (self.version_index, self.sub_version_index)
    }
}

impl Default for InstallationCursor {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_to_the_next_unit_resets_inner_indices() {
        let mut cursor = InstallationCursor::start();
        cursor.advance_file();
        cursor.advance_file();
        cursor.next_sub_version();
        assert_eq!((cursor.sub_version_index, cursor.file_index), (1, 0));

        cursor.advance_file();
        cursor.next_version();
        assert_eq!(cursor.unit(), (1, 0));
        assert_eq!(cursor.file_index, 0);
        assert!(cursor.carry_on);
    }

    #[test]
    fn stop_only_clears_the_continuation_flag() {
        let mut cursor = InstallationCursor::start();
        cursor.advance_file();
        cursor.stop();
        assert!(!cursor.carry_on);
        assert_eq!(cursor.file_index, 1);
    }
}
