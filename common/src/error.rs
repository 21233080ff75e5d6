use error_chain::error_chain;

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }

    errors{
        InvalidEncoding(t: String) {
            description("Invalid encoding")
            display("Invalid encoding: '{}'", t)
        }
        PointNotOnCurve(t: String) {
            description("Unable to Decompress Compressed ristretto Point")
            display("Unable to Decompress Compressed ristretto Point: '{}'", t)
        }
        CountMismatch(c1: usize, c1_type: &'static str, c2: usize, c2_type: &'static str) {
            description("The number of {c1_type} does not match the number of {c2_type}.")
            display("The number of {c1_type} does not match the number of {c2_type}.\nHave {c1} {c1_type} but the number of {c2} is {c2_type}.")
        }
        InsufficientShares(count: usize, t: usize){
            description("The number of validated shares is less than the required threshold.")
            display("The number of validated shares is {count}. This is less than the required threshold (t = {t}).")
        }
        UninitializedValue(t: &'static str) {
            description("Attempted to operate on an unititalized value")
            display("Attempted to operate on an unititalized value {}", t)
        }
        InvalidParameterSet(n: usize, t: usize, index: usize){
            description("Invalid Parameter Set")
            display("Invalid Parameter Set: n = {}, t = {}, index = {}.\n Valid params: 1 <= t <= n, 1 <= index <= n", n, t, index)
        }
        InvalidProof(t: String) {
            description("Invalid Proof")
            display("Invalid Proof: {}", t)
        }
        RandomnessReuse(r: String) {
            description("Ballot randomness was reused")
            display("Ballot randomness was reused: R = '{}'", r)
        }
        TallyOutOfRange(slot: usize, bound: u64) {
            description("Decrypted tally is outside the expected range")
            display("Decrypted tally for slot {} is not in [0, {}]", slot, bound)
        }
        DuplicateSubmission(kind: &'static str, index: usize) {
            description("Duplicate submission")
            display("Duplicate {} submission from index {}", kind, index)
        }
        UnknownVoter(index: usize) {
            description("Voter is not registered")
            display("Voter {} is not registered", index)
        }
        RoundAlreadyCompleted(round: &'static str, run_id: u64, index: usize) {
            description("Protocol round was already completed")
            display("Round '{}' of run {} was already completed by member {}", round, run_id, index)
        }
        InvalidState(expected: &'static str, found: String) {
            description("Operation invoked in the wrong protocol state")
            display("Expected state {}, found {}", expected, found)
        }
        WeightOverflow(what: &'static str) {
            description("Voting weight sum overflows")
            display("Sum of {} overflows u64", what)
        }
        Timeout(attempts: u32) {
            description("Gave up waiting")
            display("Gave up after {} attempts", attempts)
        }
    }
}

impl ErrorKind {
    /// Whether waiting for more contributions can make the failed operation succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::InsufficientShares(..))
    }
}
