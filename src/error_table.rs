//! Static lookup table translating backend error codes into user-facing text.
//! Pure data; unrecognized codes fall back to "NA".

pub struct ErrorMessage {
    pub title: &'static str,
    pub message: &'static str,
}

pub const ERROR_MESSAGES: &[(&str, ErrorMessage)] = &[
    ("FETCH_BUILDS_FAILED", ErrorMessage { title: "Load Builds", message: "Failed to load builds list, please try again later." }),
    ("CREATE_BUILD_FAILED", ErrorMessage { title: "Add Build", message: "Could not add a new build, please try again later." }),
    ("DELETE_APPLICATION_FAILED", ErrorMessage { title: "Delete Application", message: "Could not delete application, please try again later." }),
    ("DELETE_BUILD_FAILED", ErrorMessage { title: "Delete Build", message: "Could not delete build, please try again later." }),
    ("UPLOAD_FAILED", ErrorMessage { title: "Upload Failed", message: "Network error while uploading application, please try again later." }),
    ("UPLOAD_FAILED_BAD_FILENAME", ErrorMessage { title: "Upload Failed", message: "Please choose only a single file" }),
    ("MODIFY_APPLICATION_FAILED", ErrorMessage { title: "Application Properties ", message: "Failed to update application properties, please try again later" }),
    ("PROTECTION_START_FAILED", ErrorMessage { title: "Protection Failed", message: "Failed to start protection, please try again later" }),
    ("DOWNLOAD_FAILED", ErrorMessage { title: "Download Failed", message: "Failed to download the protected application, please try again later." }),
    ("START_PROTECTION_FAILED", ErrorMessage { title: "Start Protection", message: "Could not start the protection for this application." }),
    ("ERROR_SIGNING_CERTIFICATE_MISSING", ErrorMessage { title: "Start Protection", message: "This application can't be protected without a signing certificate. Upload a signing certificate for this app in the application properties dialog." }),
    ("ERROR_SIGNING_CERTIFICATE_INVALID", ErrorMessage { title: "Upload Certificate", message: "Please check that the input file is a valid X.509 certificate. The certificate must be PEM encoded and have sha256WithRSAEncryption Signature Algorithm." }),
    ("ERROR_SIGNING_CERTIFICATE_UNSUPPORTED_ALGORITHM", ErrorMessage { title: "Upload Certificate", message: "The Signing certificate has an unsupported algorithm. The certificate must have sha256WithRSAEncryption Signature Algorithm." }),
    ("ERROR_SIGNING_CERTIFICATE_UNSUPPORTED_SDK", ErrorMessage { title: "Upload Application", message: "The uploaded app minSdkVersion is not supported for the signature algorithm. The signing certificate bound integrity verification feature is supported only for applications with minSdkVersion between 21 and 23." }),
    ("ABORT_PROTECTION_FAILED", ErrorMessage { title: "Abort Protection", message: "Could not abort protection for this application." }),
    ("ARCHIVE_CREATION_FAILED", ErrorMessage { title: "Upload Build", message: "Failed to create directory archive, please upload an Xcode Archive file" }),
    ("ERROR_MALFORMED_UPLOAD_FILENAME", ErrorMessage { title: "Upload Build", message: "Wrong file type selected, please upload an APK file, or an Xcode Archive file or directory." }),
    ("INVALID_FILES", ErrorMessage { title: "Upload Build", message: "Wrong file type selected, please upload an APK file, or an Xcode Archive file or directory." }),
    ("ERROR_NO_FILES", ErrorMessage { title: "Upload Build", message: "Please select at least one file for upload" }),
    ("ERROR_UPLOAD_ALREADY_ACTIVE", ErrorMessage { title: "Upload Active", message: "Please wait for the current upload to complete" }),
    ("FAILED_PROTECTION_START", ErrorMessage { title: "Application Protection", message: "Failed to start protection, please try again later" }),
    ("CREATE_APPLICATION_FAILED", ErrorMessage { title: "Create Application", message: "Could not create an application at this time, please try again later" }),
    ("FETCH_APPLICATIONS_FAILED", ErrorMessage { title: "Fetch Applications", message: "Could not load applications, please try again later." }),
    ("INVALID_CLAIMS", ErrorMessage { title: "Fetch Applications", message: "APS is not enabled for the current user." }),
    ("MINIMUM_SDK_VERSION_ANDROID_TOO_SMALL", ErrorMessage { title: "Upload failed", message: "The minimum SDK version for this APK is too low." }),
    ("ANDROID_PERMISSION_INTERNET_MISSING", ErrorMessage { title: "Upload failed", message: "The Android permission INTERNET is missing in this APK." }),
    ("ERROR_APPLICATION_NOT_VALID", ErrorMessage { title: "Create application", message: "Application name is not valid." }),
    ("ERROR_APPLICATION_EXISTS", ErrorMessage { title: "Create application", message: "An application with that name already exists, please use a different name." }),
    ("BUILD_AND_APPLICATION_PACKAGE_IDS_MISMATCHING", ErrorMessage { title: "Create application", message: "The file can not be added to this application, please choose a different application or create a new application." }),
    ("BUILD_AND_SELECTED_APPLICATION_PACKAGE_IDS_MISMATCHING", ErrorMessage { title: "Create application", message: "The uploaded file does not match the selected application. Create a new application below or upload a different file." }),
    ("ANDROID_APPLICATION_DEBUGGABLE", ErrorMessage { title: "Upload Application", message: "Debuggable applications can not be protected." }),
    ("ANDROID_MINIMUM_SDK_VERSION_TOO_SMALL", ErrorMessage { title: "Upload Application", message: "The android minimum SDK version for this application is too low." }),
    ("ANDROID_MINIMUM_SDK_VERSION_MISSING", ErrorMessage { title: "Upload Application", message: "Minimum Android SDK version for this application is not specified." }),
    ("ANDROID_MINIMUM_SDK_VERSION_TOO_BIG", ErrorMessage { title: "Upload Application", message: "The android minimum SDK version for this application is too large." }),
    ("ANDROID_TARGET_SDK_VERSION_TOO_BIG", ErrorMessage { title: "Upload Application", message: "The android target SDK version for this application is too large." }),
    ("IOS_XCODE_VERSION_UNSUPPORTED", ErrorMessage { title: "Upload Application", message: "The XCode version used to build this application is not supported." }),
    ("BUILD_OS_NOT_VALID", ErrorMessage { title: "Upload Application", message: "Application OS is not valid." }),
    ("ERROR_INVALID_FILENAME", ErrorMessage { title: "Upload Application", message: "Invalid file name. File name can contain alphanumeric characters, spaces, dots, underscores and hyphens." }),
    ("ERROR_UPLOAD_LIMIT_EXCEEDED", ErrorMessage { title: "Upload Application", message: "Number of allowed uploads per month exceeded. Please upgrade your account to enable additional uploads." }),
    ("ERROR_APPLICATION_LIMIT_EXCEEDED", ErrorMessage { title: "Create Application", message: "Number of allowed apps exceeded. Please upgrade your subscription, or alternatively delete one or more existing apps." }),
    ("ERROR_STORAGE_LIMIT_EXCEEDED", ErrorMessage { title: "Upload Application", message: "Storage limits exceeded. Please upgrade your account to create additional storage, or alternatively delete one or more builds to free storage." }),
    ("ERROR_PERMISSION_APPLICATION_UPLOAD", ErrorMessage { title: "Upload Application", message: "You don't have permission to upload new builds to this application." }),
    ("ERROR_PERMISSION_APPLICATION_MODIFY", ErrorMessage { title: "Application Properties", message: "You don't have permission to modify this application." }),
];

pub fn lookup(code: &str) -> Option<&'static ErrorMessage> {
    ERROR_MESSAGES.iter().find(|(c, _)| *c == code).map(|(_, m)| m)
}

pub fn simple_message(code: &str) -> &'static str {
    lookup(code).map(|m| m.message).unwrap_or("NA")
}
